//! Discovery of round workbooks in the working directory

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One round's financial summary workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundFile {
    pub round: u32,
    pub path: PathBuf,
}

/// Result of scanning a directory for round workbooks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundDiscovery {
    /// Rounds in ascending order
    pub rounds: Vec<RoundFile>,
    /// Files that carry the prefix but could not be used, with the reason
    pub ignored: Vec<(PathBuf, String)>,
}

/// Round number of a file named `<prefix><number>.xlsx`
///
/// Prefix and extension are matched case-insensitively; the number may be
/// surrounded by spaces.
pub fn parse_round_number(file_name: &str, prefix: &str) -> Option<u32> {
    let lower = file_name.to_lowercase();
    let prefix = prefix.to_lowercase();
    let rest = lower.strip_prefix(&prefix)?;
    let number = rest.strip_suffix(".xlsx")?;
    number.trim().parse().ok()
}

fn has_prefix(file_name: &str, prefix: &str) -> bool {
    file_name.to_lowercase().starts_with(&prefix.to_lowercase())
}

/// Find every round workbook in `dir`
pub fn discover_rounds(dir: &Path, prefix: &str) -> Result<RoundDiscovery> {
    let mut found: BTreeMap<u32, PathBuf> = BTreeMap::new();
    let mut ignored = Vec::new();

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Excel lock files
        if file_name.starts_with("~$") || !has_prefix(file_name, prefix) {
            continue;
        }

        match parse_round_number(file_name, prefix) {
            Some(round) if found.contains_key(&round) => {
                ignored.push((path, format!("duplicate workbook for round {round}")));
            }
            Some(round) => {
                found.insert(round, path);
            }
            None => ignored.push((path, "no round number before .xlsx".to_string())),
        }
    }

    if found.is_empty() {
        return Err(Error::NoRoundFiles {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        });
    }

    Ok(RoundDiscovery {
        rounds: found
            .into_iter()
            .map(|(round, path)| RoundFile { round, path })
            .collect(),
        ignored,
    })
}
