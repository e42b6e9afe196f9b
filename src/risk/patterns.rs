//! Built-in base-score pattern table and argument-keyword boost table.

use regex::Regex;
use std::sync::OnceLock;

/// `(glob pattern, base score)`, checked in order; first match wins.
pub const BUILTIN_BASE_PATTERNS: &[(&str, u8)] = &[
    ("Delete*", 80),
    ("Remove*", 80),
    ("Rm*", 80),
    ("*Shell*", 75),
    ("*Bash*", 75),
    ("*Execute*", 70),
    ("*Run*", 65),
    ("*Command*", 65),
    ("*Sql*", 60),
    ("*Database*", 55),
    ("Write*", 50),
    ("Update*", 45),
    ("Edit*", 45),
    ("Create*", 40),
    ("*Query*", 40),
    ("*Fetch*", 35),
    ("*Http*", 35),
    ("*Request*", 35),
    ("Read*", 10),
    ("Get*", 10),
    ("Search*", 5),
];

/// Base score used when nothing in the custom or built-in table matches.
pub const DEFAULT_BASE_SCORE: u8 = 20;

struct KeywordRule {
    label: &'static str,
    pattern: &'static str,
    boost: u8,
}

const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule { label: "drop", pattern: r"(?i)\bdrop\b", boost: 25 },
    KeywordRule { label: "delete", pattern: r"(?i)\bdelete\b", boost: 20 },
    KeywordRule { label: "truncate", pattern: r"(?i)\btruncate\b", boost: 25 },
    KeywordRule { label: "rm -rf", pattern: r"(?i)rm\s+-rf", boost: 30 },
    KeywordRule { label: "format", pattern: r"(?i)\bformat\b", boost: 20 },
    KeywordRule { label: "privilege escalation", pattern: r"(?i)\b(sudo|chmod|chown)\b", boost: 20 },
    KeywordRule { label: "password", pattern: r"(?i)\bpassword\b", boost: 15 },
    KeywordRule { label: "secret", pattern: r"(?i)\bsecret\b", boost: 15 },
    KeywordRule { label: "token", pattern: r"(?i)\btoken\b", boost: 10 },
    KeywordRule { label: "credentials file", pattern: r"(?i)(\.env\b|\bcredentials\b)", boost: 15 },
];

static COMPILED_KEYWORD_RULES: OnceLock<Vec<(&'static str, Regex, u8)>> = OnceLock::new();

fn compiled_keyword_rules() -> &'static [(&'static str, Regex, u8)] {
    COMPILED_KEYWORD_RULES.get_or_init(|| {
        KEYWORD_RULES
            .iter()
            .map(|rule| {
                (
                    rule.label,
                    Regex::new(rule.pattern).expect("fixed keyword pattern is valid regex"),
                    rule.boost,
                )
            })
            .collect()
    })
}

/// Scan `arguments_json` for every keyword whose regex matches, returning the
/// additive boost and the human-readable reasons for each hit.
pub fn argument_boost(arguments_json: &str) -> (u8, Vec<String>) {
    let mut total = 0u32;
    let mut reasons = Vec::new();

    for (label, regex, boost) in compiled_keyword_rules() {
        if regex.is_match(arguments_json) {
            total += u32::from(*boost);
            reasons.push(format!("argument keyword matched: {label}"));
        }
    }

    (total.min(100) as u8, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_multiple_keyword_hits() {
        let (boost, reasons) = argument_boost(r#"{"cmd":"sudo rm -rf /tmp && drop table users"}"#);
        assert!(boost >= 30 + 25 + 20);
        assert!(reasons.len() >= 3);
    }

    #[test]
    fn no_keywords_means_no_boost() {
        let (boost, reasons) = argument_boost(r#"{"path":"notes.txt"}"#);
        assert_eq!(boost, 0);
        assert!(reasons.is_empty());
    }
}
