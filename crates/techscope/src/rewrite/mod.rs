//! Pattern-based query rewriting.
//!
//! There is no SQL grammar here: the rewriter recognizes a single
//! unsafe construct (`SELECT * FROM <table>`) for tables it knows, and reads
//! the projection list back out of SELECT text so result cells can be
//! labeled. Callers go through [`QueryRewriter`] so a real parser can take
//! over later.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::schema::SchemaRegistry;

pub trait QueryRewriter {
    /// Makes a caller-supplied statement safe to execute.
    fn rewrite<'q>(&self, query: &'q str) -> Cow<'q, str>;

    /// Labels for the result cells, in projection order.
    fn projected_columns(&self, query: &str) -> Vec<String>;
}

fn wildcard_select_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(?P<head>SELECT\s*\*\s*)FROM\s+(?P<table>[A-Za-z_][A-Za-z0-9_]*)\b")
            .expect("wildcard select regex should compile")
    })
}

fn table_alias_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^\s+(?:AS\s+)?(?P<alias>[A-Za-z_][A-Za-z0-9_]*)\b")
            .expect("table alias regex should compile")
    })
}

fn select_head_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\bSELECT\s+(?:DISTINCT\s+)?").expect("select head regex should compile")
    })
}

/// Words that may follow a table name without being its alias.
const CLAUSE_KEYWORDS: &[&str] = &[
    "where", "join", "inner", "left", "right", "full", "cross", "natural", "on", "using", "group",
    "order", "limit", "offset", "having", "union", "intersect", "except", "window", "indexed",
    "not",
];

#[derive(Debug, Clone)]
pub struct PatternRewriter {
    registry: SchemaRegistry,
}

impl PatternRewriter {
    #[must_use]
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }
}

impl Default for PatternRewriter {
    fn default() -> Self {
        Self::new(SchemaRegistry::technographics())
    }
}

impl QueryRewriter for PatternRewriter {
    fn rewrite<'q>(&self, query: &'q str) -> Cow<'q, str> {
        rewrite_wildcard(&self.registry, query)
    }

    fn projected_columns(&self, query: &str) -> Vec<String> {
        extract_projected_columns(query)
    }
}

/// Replaces the first `SELECT * FROM <known table>` projection with the
/// table's registered columns. Unknown tables and statements without the
/// pattern come back borrowed and untouched.
#[must_use]
pub fn rewrite_wildcard<'q>(registry: &SchemaRegistry, query: &'q str) -> Cow<'q, str> {
    for captures in wildcard_select_regex().captures_iter(query) {
        let (Some(head), Some(table_match)) = (captures.name("head"), captures.name("table")) else {
            continue;
        };
        if inside_quotes(query, head.start()) {
            continue;
        }
        let Some(table) = registry.table(table_match.as_str()) else {
            continue;
        };

        let qualifier = table_alias(&query[table_match.end()..]).unwrap_or(table.name.as_str());
        let column_list = table
            .columns
            .iter()
            .map(|column| format!("{qualifier}.{column}"))
            .collect::<Vec<_>>()
            .join(", ");

        let rewritten = format!(
            "{}SELECT {column_list} {}",
            &query[..head.start()],
            &query[head.end()..]
        );
        tracing::debug!(
            table = %table.name,
            columns = %column_list,
            "expanded wildcard projection"
        );
        return Cow::Owned(rewritten);
    }

    Cow::Borrowed(query)
}

fn table_alias(after_table: &str) -> Option<&str> {
    let alias = table_alias_regex().captures(after_table)?.name("alias")?.as_str();
    let lowered = alias.to_ascii_lowercase();
    (!CLAUSE_KEYWORDS.contains(&lowered.as_str())).then_some(alias)
}

/// Reads the projection of the first `SELECT [DISTINCT] ... FROM` span and
/// splits it on top-level commas. Empty when there is no such span.
#[must_use]
pub fn extract_projected_columns(query: &str) -> Vec<String> {
    let Some(head) = select_head_regex().find(query) else {
        return Vec::new();
    };
    let projection_and_rest = &query[head.end()..];
    let Some(from_offset) = find_top_level_from(projection_and_rest) else {
        return Vec::new();
    };

    let columns = split_top_level(&projection_and_rest[..from_offset], ',')
        .into_iter()
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    tracing::debug!(?columns, "extracted projected columns");
    columns
}

/// Byte offset of the first `FROM` keyword outside parentheses and quotes
/// that is preceded by whitespace.
fn find_top_level_from(text: &str) -> Option<usize> {
    let mut scanner = DepthScanner::default();
    let bytes = text.as_bytes();

    for (index, ch) in text.char_indices() {
        if scanner.advance(ch) {
            continue;
        }
        let preceded_by_space = index > 0 && bytes[index - 1].is_ascii_whitespace();
        if !preceded_by_space {
            continue;
        }
        let Some(word) = text.get(index..index + 4) else {
            continue;
        };
        let followed_by_boundary = bytes
            .get(index + 4)
            .is_none_or(|next| !(next.is_ascii_alphanumeric() || *next == b'_'));
        if word.eq_ignore_ascii_case("from") && followed_by_boundary {
            return Some(index);
        }
    }

    None
}

/// Splits on `separator` where it is not nested in parentheses or quotes.
#[must_use]
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut scanner = DepthScanner::default();
    let mut parts = Vec::new();
    let mut start = 0usize;

    for (index, ch) in text.char_indices() {
        if scanner.advance(ch) {
            continue;
        }
        if ch == separator {
            parts.push(&text[start..index]);
            start = index + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

fn inside_quotes(text: &str, offset: usize) -> bool {
    let mut scanner = DepthScanner::default();
    for ch in text[..offset].chars() {
        scanner.advance(ch);
    }
    scanner.quote.is_some()
}

/// Tracks parenthesis depth and quoting while walking SQL text.
#[derive(Debug, Default)]
struct DepthScanner {
    depth: usize,
    quote: Option<char>,
}

impl DepthScanner {
    /// Consumes one character; returns `true` when the character is nested
    /// (inside quotes or parentheses, or is itself a bracket or quote).
    fn advance(&mut self, ch: char) -> bool {
        if let Some(open) = self.quote {
            if ch == open {
                self.quote = None;
            }
            return true;
        }

        match ch {
            '\'' | '"' | '`' => {
                self.quote = Some(ch);
                true
            }
            '(' => {
                self.depth += 1;
                true
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                true
            }
            _ => self.depth > 0,
        }
    }
}
