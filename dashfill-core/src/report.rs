//! Run reporting with round and firm scoped notices

use serde::Serialize;
use std::cmp::Ordering;
use std::path::PathBuf;

/// Severity level of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Scope of a notice (run, round, or one firm within a round)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NoticeScope {
    /// Run-level notice
    Run,
    /// Round-level notice
    Round(u32),
    /// Firm within a round
    Firm(u32, String),
}

impl NoticeScope {
    pub fn round(&self) -> Option<u32> {
        match self {
            NoticeScope::Run => None,
            NoticeScope::Round(round) | NoticeScope::Firm(round, _) => Some(*round),
        }
    }
}

impl PartialOrd for NoticeScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NoticeScope {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NoticeScope::Run, NoticeScope::Run) => Ordering::Equal,
            (NoticeScope::Run, _) => Ordering::Less,
            (_, NoticeScope::Run) => Ordering::Greater,
            (NoticeScope::Round(a), NoticeScope::Round(b)) => a.cmp(b),
            (NoticeScope::Round(a), NoticeScope::Firm(b, _)) => a.cmp(b).then(Ordering::Less),
            (NoticeScope::Firm(a, _), NoticeScope::Round(b)) => a.cmp(b).then(Ordering::Greater),
            (NoticeScope::Firm(round_a, firm_a), NoticeScope::Firm(round_b, firm_b)) => {
                round_a.cmp(round_b).then_with(|| firm_a.cmp(firm_b))
            }
        }
    }
}

/// Cell reference (e.g., A1, B2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellReference {
    pub row: u32,
    pub col: u32,
}

impl CellReference {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an Excel-style reference like "B5" into 0-based indices
    pub fn parse(cell_ref: &str) -> Option<Self> {
        let letters: String = cell_ref
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let digits = &cell_ref[letters.len()..];
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let col = letters.chars().fold(0u32, |acc, ch| {
            acc.saturating_mul(26)
                .saturating_add(ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        });
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col - 1))
    }

    /// Convert to Excel-style reference (e.g., "A1")
    pub fn to_excel_ref(&self) -> String {
        format!("{}{}", Self::col_to_letter(self.col), self.row + 1)
    }

    /// Convert column number to letter (0 -> A, 1 -> B, etc.)
    pub fn col_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            result.insert(0, (b'A' + (col % 26) as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

impl PartialOrd for CellReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row.cmp(&other.row).then_with(|| self.col.cmp(&other.col))
    }
}

impl std::fmt::Display for CellReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_excel_ref())
    }
}

/// Something the user should know about a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub scope: NoticeScope,
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    pub fn new(scope: NoticeScope, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            scope,
            message: message.into(),
            severity,
        }
    }

    pub fn info(scope: NoticeScope, message: impl Into<String>) -> Self {
        Self::new(scope, message, Severity::Info)
    }

    pub fn warning(scope: NoticeScope, message: impl Into<String>) -> Self {
        Self::new(scope, message, Severity::Warning)
    }

    pub fn error(scope: NoticeScope, message: impl Into<String>) -> Self {
        Self::new(scope, message, Severity::Error)
    }
}

impl PartialOrd for Notice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Notice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scope
            .cmp(&other.scope)
            .then_with(|| other.severity.cmp(&self.severity))
            .then_with(|| self.message.cmp(&other.message))
    }
}

/// One value written into the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWrite {
    /// Dashboard label the value belongs to
    pub label: String,
    /// Source metric the value came from
    pub source: String,
    pub cell: CellReference,
    pub value: f64,
}

/// Outcome for one firm in one round
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitReport {
    pub firm: String,
    /// Metric pairs found on the firm's source sheet
    pub extracted: usize,
    pub writes: Vec<CellWrite>,
    /// Dashboard labels with no source value
    pub unmatched: Vec<String>,
    /// Dashboard labels with a value but no writable cell next to them
    pub unplaced: Vec<String>,
}

impl UnitReport {
    pub fn written(&self) -> usize {
        self.writes.len()
    }
}

/// Outcome for one round workbook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundReport {
    pub round: u32,
    pub source: PathBuf,
    pub year_sheet: String,
    pub units: Vec<UnitReport>,
}

impl RoundReport {
    pub fn written(&self) -> usize {
        self.units.iter().map(UnitReport::written).sum()
    }
}

/// Everything a run did and skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub rounds: Vec<RoundReport>,
    pub notices: Vec<Notice>,
    /// Output workbook, `None` on a dry run
    pub output: Option<PathBuf>,
}

impl RunReport {
    pub fn push(&mut self, notice: Notice) {
        match notice.severity {
            Severity::Error => tracing::error!("{}", notice.message),
            Severity::Warning => tracing::warn!("{}", notice.message),
            Severity::Info => tracing::info!("{}", notice.message),
        }
        self.notices.push(notice);
    }

    /// Total number of cells written across rounds
    pub fn cells_written(&self) -> usize {
        self.rounds.iter().map(RoundReport::written).sum()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.notices.iter().filter(|n| n.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    /// Notices sorted by scope for hierarchical reporting
    pub fn sorted_notices(&self) -> Vec<&Notice> {
        let mut notices: Vec<_> = self.notices.iter().collect();
        notices.sort();
        notices
    }
}
