//! Date canonicalization.
//!
//! Every date field in the canonical resume is one of: "Month YYYY",
//! "YYYY", or "Present". Anything recognizable is rewritten into that set;
//! anything else is dropped to `None` (and recorded upstream) rather than
//! guessed at. A month or day is never invented — "2023" stays "2023".

use std::sync::OnceLock;

use regex::Regex;

pub(crate) const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const PRESENT_WORDS: &[&str] = &["present", "current", "now", "ongoing"];

/// Rewrites a raw date string into canonical form, or `None` when the shape
/// is not recognized.
pub fn canonicalize_date(raw: &str) -> Option<String> {
    let date = raw.trim();
    if date.is_empty() {
        return None;
    }

    if PRESENT_WORDS.contains(&date.to_lowercase().as_str()) {
        return Some("Present".to_string());
    }

    // Bare year
    if year_re().is_match(date) {
        return Some(date.to_string());
    }

    // "March 2023", "mar 2023", "Sept. 2023", "March 15, 2023"
    if let Some(canonical) = parse_month_name_form(date) {
        return Some(canonical);
    }

    // MM/YYYY or MM-YYYY
    if let Some(caps) = mm_yyyy_re().captures(date) {
        let month: usize = caps[1].parse().ok()?;
        return month_year(month, &caps[2]);
    }

    // YYYY-MM
    if let Some(caps) = yyyy_mm_re().captures(date) {
        let month: usize = caps[2].parse().ok()?;
        return month_year(month, &caps[1]);
    }

    // YYYY-MM-DD
    if let Some(caps) = yyyy_mm_dd_re().captures(date) {
        let month: usize = caps[2].parse().ok()?;
        return month_year(month, &caps[1]);
    }

    None
}

fn month_year(month: usize, year: &str) -> Option<String> {
    if (1..=12).contains(&month) {
        Some(format!("{} {}", MONTHS[month - 1], year))
    } else {
        None
    }
}

/// Handles "<month> <year>" and "<month> <day>, <year>" with full or
/// abbreviated month names in any case.
fn parse_month_name_form(date: &str) -> Option<String> {
    let parts: Vec<&str> = date.split_whitespace().collect();
    match parts.as_slice() {
        [month, year] => {
            let idx = month_index(month)?;
            let year = year_re().is_match(year).then_some(*year)?;
            Some(format!("{} {}", MONTHS[idx], year))
        }
        [month, day, year] => {
            let idx = month_index(month)?;
            let day: u32 = day.trim_end_matches(',').parse().ok()?;
            if !(1..=31).contains(&day) {
                return None;
            }
            let year = year_re().is_match(year).then_some(*year)?;
            Some(format!("{} {}", MONTHS[idx], year))
        }
        _ => None,
    }
}

fn month_index(token: &str) -> Option<usize> {
    let token = token.trim_end_matches('.').to_lowercase();
    if token.len() < 3 {
        return None;
    }
    MONTHS.iter().position(|name| {
        let name = name.to_lowercase();
        name == token || (token.len() <= 4 && name.starts_with(&token))
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}$").expect("valid regex"))
}

fn mm_yyyy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})[/-](\d{4})$").expect("valid regex"))
}

fn yyyy_mm_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid regex"))
}

fn yyyy_mm_dd_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"))
}
