use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;

const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "create", "alter", "drop", "replace", "truncate", "attach",
    "detach", "pragma", "vacuum", "reindex", "analyze", "begin", "commit", "rollback",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailViolation {
    EmptyStatement,
    MultiStatement,
    MutatingKeyword(String),
    UnsupportedStatement(String),
}

impl Display for GuardrailViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStatement => f.write_str("SQL query is empty"),
            Self::MultiStatement => f.write_str("multi-statement SQL is not allowed"),
            Self::MutatingKeyword(keyword) => {
                write!(f, "mutating SQL keyword `{keyword}` is not allowed")
            }
            Self::UnsupportedStatement(leading) => {
                write!(f, "statements starting with `{leading}` are not allowed")
            }
        }
    }
}

/// Admits exactly one statement that starts with SELECT and carries no
/// mutating keyword outside string literals and comments.
pub fn validate_read_only_sql(raw_sql: &str) -> Result<(), GuardrailViolation> {
    let blanked = blank_literals_and_comments(raw_sql);
    let code = strip_trailing_semicolons(&blanked);
    if code.is_empty() {
        return Err(GuardrailViolation::EmptyStatement);
    }
    if code.contains(';') {
        return Err(GuardrailViolation::MultiStatement);
    }

    let normalized = code.to_ascii_lowercase();
    if let Some(keyword) = first_mutating_keyword(&normalized) {
        return Err(GuardrailViolation::MutatingKeyword(keyword));
    }

    let leading = leading_keyword(&normalized);
    if leading != "select" {
        return Err(GuardrailViolation::UnsupportedStatement(leading));
    }

    Ok(())
}

fn word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[a-z0-9_]+").expect("sql word regex should compile"))
}

fn strip_trailing_semicolons(code: &str) -> &str {
    let mut candidate = code.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }
    candidate
}

/// Replaces the contents of quoted literals and identifiers, and whole
/// `--` and `/* */` comments, with spaces so keyword and separator scans
/// only see SQL code.
fn blank_literals_and_comments(sql: &str) -> String {
    let mut output = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
                output.push(ch);
            } else {
                output.push(' ');
            }
            continue;
        }

        let next = chars.peek().copied();
        match (ch, next) {
            ('\'' | '"' | '`', _) => {
                quote = Some(ch);
                output.push(ch);
            }
            ('-', Some('-')) => {
                output.push(' ');
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        output.push('\n');
                        break;
                    }
                    output.push(' ');
                }
            }
            ('/', Some('*')) => {
                chars.next();
                output.push_str("  ");
                let mut previous = ' ';
                for skipped in chars.by_ref() {
                    output.push(' ');
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
            }
            _ => output.push(ch),
        }
    }
    output
}

/// `replace(` is the string function, not the statement.
fn first_mutating_keyword(normalized_sql: &str) -> Option<String> {
    word_regex().find_iter(normalized_sql).find_map(|word| {
        let token = word.as_str();
        if !MUTATING_KEYWORDS.contains(&token) {
            return None;
        }
        let is_function_call = normalized_sql[word.end()..].trim_start().starts_with('(');
        if token == "replace" && is_function_call {
            return None;
        }
        Some(token.to_string())
    })
}

fn leading_keyword(normalized_sql: &str) -> String {
    word_regex()
        .find(normalized_sql)
        .map_or("unknown", |word| word.as_str())
        .to_string()
}
