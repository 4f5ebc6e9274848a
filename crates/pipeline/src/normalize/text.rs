//! Text hygiene applied to source material before it reaches the prompt.
//!
//! Flow: sanitize (control chars) → clean (unicode punctuation, whitespace)
//! → redact (sensitive patterns). All three are pure; `clean_source_text`
//! composes them in that order.

use std::sync::OnceLock;

use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Strips null bytes and non-printable control characters while keeping
/// `\n`, `\r`, `\t`. Broken control characters in extracted PDFs and GitHub
/// READMEs otherwise leak straight into the model call and corrupt it.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Folds typographic punctuation to ASCII and collapses whitespace runs.
/// Keeps at most one blank line between paragraphs.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201c}' | '\u{201d}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2022}' => out.push('-'),
            '\u{00a0}' => out.push(' '),
            other => out.push(other),
        }
    }
    let out = horizontal_ws_re().replace_all(&out, " ");
    let out = blank_lines_re().replace_all(&out, "\n\n");
    out.trim().to_string()
}

/// Masks SSN, passport, and card-number shapes. Resume text occasionally
/// carries these and they must never reach the model or the logs.
pub fn redact_sensitive(text: &str) -> String {
    let text = ssn_re().replace_all(text, REDACTED);
    let text = passport_re().replace_all(&text, REDACTED);
    let text = card_re().replace_all(&text, REDACTED);
    text.into_owned()
}

/// The full pre-pass for any source text headed into the prompt.
pub fn clean_source_text(text: &str) -> String {
    redact_sensitive(&clean_text(&sanitize_text(text)))
}

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("valid regex"))
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

fn ssn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid regex"))
}

fn passport_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2}\d{7}\b").expect("valid regex"))
}

fn card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b").expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_control_chars_keeps_whitespace() {
        let input = "line one\u{0}\u{7}\nline\ttwo\r\n";
        assert_eq!(sanitize_text(input), "line one\nline\ttwo\r\n");
    }

    #[test]
    fn test_clean_folds_smart_punctuation() {
        let input = "\u{201c}It\u{2019}s done\u{201d} \u{2014} really";
        assert_eq!(clean_text(input), "\"It's done\" - really");
    }

    #[test]
    fn test_clean_collapses_whitespace_runs() {
        let input = "a  \t b\n\n\n\n\nc";
        assert_eq!(clean_text(input), "a b\n\nc");
    }

    #[test]
    fn test_redacts_ssn_and_card_numbers() {
        let input = "SSN 123-45-6789 and card 4111-1111-1111-1111 on file";
        let out = redact_sensitive(input);
        assert!(!out.contains("123-45-6789"));
        assert!(!out.contains("4111"));
        assert_eq!(out.matches("[REDACTED]").count(), 2);
    }

    #[test]
    fn test_redacts_passport_shape() {
        assert_eq!(redact_sensitive("passport AB1234567."), "passport [REDACTED].");
    }

    #[test]
    fn test_clean_source_text_composes_all_passes() {
        let input = "  Built\u{0} the \u{201c}billing\u{201d} system.   SSN: 123-45-6789\n\n\n\nEnd ";
        let out = clean_source_text(input);
        assert_eq!(out, "Built the \"billing\" system. SSN: [REDACTED]\n\nEnd");
    }

    #[test]
    fn test_phone_numbers_survive_redaction() {
        // 10-digit phones do not match the SSN or card shapes
        let input = "call 555-867-5309";
        assert_eq!(redact_sensitive(input), input);
    }
}
