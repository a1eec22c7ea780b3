use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// `YYYY-MM-DD HH:MM:SS`, second precision, no zone suffix.
pub const CANONICAL_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const NAIVE_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
);

const MIN_TIMESTAMP_LEN: usize = "YYYY-MM-DD HH:MM:SS".len();

#[must_use]
pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[must_use]
pub fn format_canonical(timestamp: PrimitiveDateTime) -> Option<String> {
    timestamp.format(CANONICAL_TIMESTAMP_FORMAT).ok()
}

/// Parses text that looks like a date/time instant. Offset-bearing instants
/// are shifted to UTC; naive ones are taken as-is. Date-only text is not an
/// instant and yields `None`.
#[must_use]
pub fn parse_timestamp_text(raw: &str) -> Option<PrimitiveDateTime> {
    let candidate = raw.trim();
    if !looks_like_timestamp(candidate) {
        return None;
    }

    if let Ok(parsed) = OffsetDateTime::parse(candidate, &Rfc3339) {
        let utc = parsed.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }

    let spaced;
    let naive = match (candidate.get(..10), candidate.get(10..11), candidate.get(11..)) {
        (Some(date), Some("T"), Some(rest)) => {
            spaced = format!("{date} {rest}");
            spaced.as_str()
        }
        _ => candidate,
    };
    PrimitiveDateTime::parse(naive, NAIVE_TIMESTAMP_FORMAT).ok()
}

/// Renders timestamp-looking text canonically; `None` when the text is not
/// a recognizable instant.
#[must_use]
pub fn canonicalize_timestamp_text(raw: &str) -> Option<String> {
    parse_timestamp_text(raw).and_then(format_canonical)
}

fn looks_like_timestamp(candidate: &str) -> bool {
    let bytes = candidate.as_bytes();
    bytes.len() >= MIN_TIMESTAMP_LEN
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && matches!(bytes[10], b' ' | b'T')
        && bytes[13] == b':'
}
