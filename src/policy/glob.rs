//! Glob matching for server-name and tool-name patterns.
//!
//! Patterns are translated to an anchored, case-sensitive regex: `*` becomes
//! `.*`, `?` becomes `.`, and every other regex metacharacter is escaped.
//! An empty pattern matches only the empty string.

use regex::Regex;

pub fn glob_match(pattern: &str, text: &str) -> bool {
    compile(pattern).is_match(text)
}

fn compile(pattern: &str) -> Regex {
    let mut translated = String::with_capacity(pattern.len() * 2 + 2);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            c if is_regex_metachar(c) => {
                translated.push('\\');
                translated.push(c);
            }
            c => translated.push(c),
        }
    }
    translated.push('$');
    // Every character class above is either escaped or whitelisted, so this
    // can only fail if `regex` itself changes its grammar.
    Regex::new(&translated).expect("translated glob pattern is always a valid regex")
}

fn is_regex_metachar(c: char) -> bool {
    matches!(
        c,
        '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\'
    )
}
