//! Argument validation helpers shared by the tool handlers.

use std::str::FromStr;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .expect("email pattern is valid")
});

static RFC3339_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})$")
        .expect("rfc3339 pattern is valid")
});

static ADDRESS_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*").expect("separator pattern is valid"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Gmail user ids are either the literal `me` or the user's address.
pub fn is_valid_user_id(user_id: &str) -> bool {
    user_id == "me" || is_valid_email(user_id)
}

/// Full timestamp with an explicit offset, e.g. `2025-10-01T12:00:00Z`.
pub fn is_rfc3339(value: &str) -> bool {
    RFC3339_RE.is_match(value) && DateTime::parse_from_rfc3339(value).is_ok()
}

/// True when both timestamps parse and `start` is strictly earlier.
pub fn start_before_end(start: &str, end: &str) -> bool {
    match (DateTime::parse_from_rfc3339(start), DateTime::parse_from_rfc3339(end)) {
        (Ok(s), Ok(e)) => s < e,
        _ => false,
    }
}

/// IANA time zone name known to the tz database (e.g. `Asia/Kolkata`).
pub fn is_valid_timezone(tz: &str) -> bool {
    chrono_tz::Tz::from_str(tz).is_ok()
}

/// Split a comma separated recipient list, dropping bracket characters
/// and empty entries.
pub fn split_addresses(raw: &str) -> Vec<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>'))
        .collect();
    ADDRESS_SEPARATOR_RE
        .split(&cleaned)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Addresses partitioned into (valid, invalid).
pub fn partition_addresses<I, S>(addresses: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for address in addresses {
        let address = address.as_ref().trim();
        if is_valid_email(address) {
            valid.push(address.to_string());
        } else {
            invalid.push(address.to_string());
        }
    }
    (valid, invalid)
}
