//! Numeric interpretation of cell text
//!
//! Financial summaries often carry numbers as formatted text: thousands
//! separators, a currency sign, accounting-style parentheses for negatives
//! and a trailing percent sign. The grammar accepted here is either
//! `-`? `$`? amount `%`? or `(` `$`? amount `)` `%`?, where amount is
//! digit (digit | `,`)* (`.` digit*)?

use regex::Regex;
use std::sync::LazyLock;

static NUMERIC_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\$?\d[\d,]*(\.\d*)?|\(\$?\d[\d,]*(\.\d*)?\))%?$").expect("numeric text pattern is valid")
});

/// Parse formatted numeric text, `None` when the text is not a number
///
/// Parenthesised values are negative and a percent sign is dropped without
/// scaling, so `"12.5%"` reads as `12.5`.
pub fn parse_number(text: &str) -> Option<f64> {
    let s = text.trim();
    if !NUMERIC_TEXT.is_match(s) {
        return None;
    }

    // The pattern only admits balanced parentheses around an unsigned amount
    let negative = s.starts_with('(');
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ',' | '$' | '%'))
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}
