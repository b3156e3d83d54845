//! Relative reference shifting for shared formulas
//!
//! A shared formula stores its text once, on the master cell. Followers carry
//! only the group index and evaluate the master text moved by their offset.
//! When the master is overwritten the followers need that text spelled out.

use crate::report::CellReference;
use regex::Regex;
use std::sync::LazyLock;

const MAX_ROWS: i64 = 1_048_576;
const MAX_COLS: i64 = 16_384;

static CELL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)([0-9]+)").expect("cell reference pattern is valid")
});

/// Formula text of a shared-formula group, anchored at its master cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFormula {
    pub text: String,
    pub row: u32,
    pub col: u32,
}

impl SharedFormula {
    /// Text the follower at (row, col) evaluates
    pub fn text_at(&self, row: u32, col: u32) -> String {
        shift_formula(
            &self.text,
            i64::from(row) - i64::from(self.row),
            i64::from(col) - i64::from(self.col),
        )
    }
}

/// Move every relative A1 reference in `formula` by the given offset
///
/// String literals and quoted sheet names are left alone. A reference pushed
/// off the grid becomes `#REF!`.
pub fn shift_formula(formula: &str, rows: i64, cols: i64) -> String {
    if rows == 0 && cols == 0 {
        return formula.to_string();
    }

    let mut out = String::with_capacity(formula.len());
    let mut segment_start = 0;
    let mut quote: Option<char> = None;

    for (i, ch) in formula.char_indices() {
        match quote {
            Some(q) if ch == q => {
                out.push_str(&formula[segment_start..=i]);
                segment_start = i + 1;
                quote = None;
            }
            Some(_) => {}
            None if ch == '"' || ch == '\'' => {
                shift_segment(formula, segment_start, i, rows, cols, &mut out);
                segment_start = i;
                quote = Some(ch);
            }
            None => {}
        }
    }

    if quote.is_some() {
        out.push_str(&formula[segment_start..]);
    } else {
        shift_segment(formula, segment_start, formula.len(), rows, cols, &mut out);
    }
    out
}

/// Shift the references of `formula[start..end]`, which holds no quotes
fn shift_segment(formula: &str, start: usize, end: usize, rows: i64, cols: i64, out: &mut String) {
    let segment = &formula[start..end];
    let mut last = 0;

    for caps in CELL_REF.captures_iter(segment) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // Part of a longer identifier or a function call
        let before = formula[..start + whole.start()].chars().next_back();
        let after = formula[start + whole.end()..].chars().next();
        if before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            || after.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '(')
        {
            continue;
        }

        let Some(position) = CellReference::parse(&format!("{}{}", &caps[2], &caps[4])) else {
            continue;
        };
        if i64::from(position.col) >= MAX_COLS || i64::from(position.row) >= MAX_ROWS {
            continue;
        }

        let col = i64::from(position.col) + if caps[1].is_empty() { cols } else { 0 };
        let row = i64::from(position.row) + if caps[3].is_empty() { rows } else { 0 };

        out.push_str(&segment[last..whole.start()]);
        if (0..MAX_COLS).contains(&col) && (0..MAX_ROWS).contains(&row) {
            let shifted = CellReference::new(row as u32, col as u32);
            out.push_str(&caps[1]);
            out.push_str(&CellReference::col_to_letter(shifted.col));
            out.push_str(&caps[3]);
            out.push_str(&(shifted.row + 1).to_string());
        } else {
            out.push_str("#REF!");
        }
        last = whole.end();
    }
    out.push_str(&segment[last..]);
}
