//! Placement of extracted metrics onto a dashboard year sheet

use super::DashboardWorkbook;
use super::layout::{YearLayout, dashboard_label, normalize_header};
use crate::aliases::AliasTable;
use crate::config::{TransferConfig, WritePolicy};
use crate::error::{Error, Result};
use crate::extractor::MetricMapping;
use crate::reader::Sheet;
use crate::report::{CellReference, CellWrite, UnitReport};
use std::ops::Range;

/// Cells one firm would receive, computed before touching the dashboard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirmPlan {
    pub writes: Vec<CellWrite>,
    pub unmatched: Vec<String>,
    pub unplaced: Vec<String>,
}

/// Writes a firm's metrics into its block of a year sheet
pub struct DashboardWriter<'a> {
    config: &'a TransferConfig,
    aliases: &'a AliasTable,
}

impl<'a> DashboardWriter<'a> {
    pub fn new(config: &'a TransferConfig, aliases: &'a AliasTable) -> Self {
        Self { config, aliases }
    }

    pub fn detect_layout(&self, sheet: &Sheet) -> YearLayout {
        YearLayout::detect(sheet, self.config.scan_bounds(), &self.config.firm_prefix)
    }

    /// Work out every write for `firm` without modifying anything
    pub fn plan(
        &self,
        sheet: &Sheet,
        layout: &YearLayout,
        firm: &str,
        mapping: &MetricMapping,
    ) -> Result<FirmPlan> {
        let firm_label = self.config.firm_label(firm);
        let missing = || Error::MissingFirmBlock {
            label: firm_label.clone(),
            sheet: layout.sheet.clone(),
        };
        let prefix = normalize_header(&self.config.firm_prefix);
        let mut plan = FirmPlan::default();

        match self.config.write_policy {
            WritePolicy::FirmColumn => {
                let col = layout.firm_column(&firm_label).ok_or_else(missing)?;
                let labels =
                    layout.label_rows(sheet, &self.config.firm_prefix, self.config.match_case);
                for (row, label) in labels {
                    let target = dashboard_label(sheet.value(row, col), &prefix)
                        .is_none()
                        .then(|| CellReference::new(row, col));
                    self.place(&mut plan, mapping, label, target);
                }
            }
            WritePolicy::Adjacent | WritePolicy::SearchRight => {
                let block = layout.firm_block(&firm_label).ok_or_else(missing)?;
                let first_row = layout.header_row.map_or(0, |row| row + 1);
                // Labels only sit in used cells; targets may lie past them
                let (max_rows, max_cols) = layout.bounds.limits(sheet);
                for row in first_row..max_rows {
                    for col in block.start..block.end.min(max_cols) {
                        let Some(label) = dashboard_label(sheet.value(row, col), &prefix) else {
                            continue;
                        };
                        let target = self.block_target(sheet, row, col, &block, &prefix);
                        self.place(&mut plan, mapping, label.to_string(), target);
                    }
                }
            }
        }

        Ok(plan)
    }

    /// Apply the plan for `firm` to the dashboard
    pub fn write_firm(
        &self,
        dashboard: &mut DashboardWorkbook,
        layout: &YearLayout,
        firm: &str,
        mapping: &MetricMapping,
    ) -> Result<UnitReport> {
        let plan = {
            let sheet = dashboard
                .sheet(&layout.sheet)
                .ok_or_else(|| Error::MissingSheet {
                    sheet: layout.sheet.clone(),
                    workbook: dashboard.template_path().to_path_buf(),
                })?;
            self.plan(sheet, layout, firm, mapping)?
        };

        for write in &plan.writes {
            dashboard.write_number(&layout.sheet, write.cell.row, write.cell.col, write.value)?;
            tracing::debug!(
                "{}!{} = {} for firm {} ('{}' from '{}')",
                layout.sheet,
                write.cell,
                write.value,
                firm,
                write.label,
                write.source
            );
        }
        for label in &plan.unmatched {
            tracing::debug!("firm {}: no value for dashboard label '{}'", firm, label);
        }
        for label in &plan.unplaced {
            tracing::debug!("firm {}: no writable cell for dashboard label '{}'", firm, label);
        }

        Ok(UnitReport {
            firm: firm.to_string(),
            extracted: mapping.len(),
            writes: plan.writes,
            unmatched: plan.unmatched,
            unplaced: plan.unplaced,
        })
    }

    fn place(
        &self,
        plan: &mut FirmPlan,
        mapping: &MetricMapping,
        label: String,
        target: Option<CellReference>,
    ) {
        match (self.aliases.lookup(mapping, &label), target) {
            (Some(record), Some(cell)) => plan.writes.push(CellWrite {
                label,
                source: record.name.clone(),
                cell,
                value: record.value,
            }),
            (Some(_), None) => plan.unplaced.push(label),
            (None, _) => plan.unmatched.push(label),
        }
    }

    /// Value cell for a label inside a firm block; labels are never overwritten
    fn block_target(
        &self,
        sheet: &Sheet,
        row: u32,
        col: u32,
        block: &Range<u32>,
        prefix: &str,
    ) -> Option<CellReference> {
        if self.config.write_policy == WritePolicy::SearchRight {
            let numeric = (1..=self.config.look_right_max)
                .map(|offset| col + offset)
                .take_while(|&c| c < block.end)
                .find(|&c| sheet.value(row, c).as_number().is_some());
            if let Some(c) = numeric {
                return Some(CellReference::new(row, c));
            }
        }

        let adjacent = col + 1;
        let writable =
            adjacent < block.end && dashboard_label(sheet.value(row, adjacent), prefix).is_none();
        writable.then(|| CellReference::new(row, adjacent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::MetricRecord;
    use crate::reader::CellValue;

    fn sheet_with(cells: &[(u32, u32, CellValue)]) -> Sheet {
        let mut sheet = Sheet::new("Year 1");
        for (row, col, value) in cells {
            sheet.set_value(*row, *col, value.clone());
        }
        sheet
    }

    fn mapping(pairs: &[(&str, f64)]) -> MetricMapping {
        let mut mapping = MetricMapping::new(false);
        for (row, (name, value)) in pairs.iter().enumerate() {
            mapping.insert(MetricRecord {
                name: name.to_string(),
                value: *value,
                row: row as u32,
                col: 1,
            });
        }
        mapping
    }

    fn config(policy: WritePolicy) -> TransferConfig {
        TransferConfig {
            write_policy: policy,
            ..TransferConfig::default()
        }
    }

    fn firm_column_sheet() -> Sheet {
        sheet_with(&[
            (1, 1, "FIRM A".into()),
            (1, 2, "FIRM B".into()),
            (2, 0, "Inventory".into()),
            (3, 0, "Beg. Inventory".into()),
            (4, 0, "Ending Cash".into()),
            (2, 2, 1.0.into()),
        ])
    }

    #[test]
    fn test_firm_column_plan() {
        let config = config(WritePolicy::FirmColumn);
        let mut aliases = AliasTable::new(false);
        aliases.insert("Starting Inventory", "Beg. Inventory");
        let writer = DashboardWriter::new(&config, &aliases);

        let sheet = firm_column_sheet();
        let layout = writer.detect_layout(&sheet);
        let source = mapping(&[("Inventory", 100.0), ("Starting Inventory", 50.0)]);
        let plan = writer.plan(&sheet, &layout, "A", &source).unwrap();

        let cells: Vec<_> = plan
            .writes
            .iter()
            .map(|w| (w.cell.to_string(), w.value))
            .collect();
        assert_eq!(
            cells,
            vec![("B3".to_string(), 100.0), ("B4".to_string(), 50.0)]
        );
        assert_eq!(plan.writes[1].source, "Starting Inventory");
        assert_eq!(plan.unmatched, vec!["Ending Cash".to_string()]);

        // Firm B overwrites its stale value in C3
        let plan = writer.plan(&sheet, &layout, "B", &source).unwrap();
        assert_eq!(plan.writes[0].cell, CellReference::new(2, 2));
    }

    #[test]
    fn test_missing_firm_block() {
        let config = config(WritePolicy::FirmColumn);
        let aliases = AliasTable::new(false);
        let writer = DashboardWriter::new(&config, &aliases);

        let sheet = firm_column_sheet();
        let layout = writer.detect_layout(&sheet);
        let err = writer
            .plan(&sheet, &layout, "G", &mapping(&[("Inventory", 1.0)]))
            .unwrap_err();
        match err {
            Error::MissingFirmBlock { label, sheet } => {
                assert_eq!(label, "FIRM G");
                assert_eq!(sheet, "Year 1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn block_sheet() -> Sheet {
        sheet_with(&[
            (0, 0, "FIRM A".into()),
            (0, 3, "FIRM B".into()),
            (1, 0, "Inventory".into()),
            (1, 3, "Inventory".into()),
            (2, 0, "Sales".into()),
            (2, 1, "units".into()),
            (3, 0, "Cash".into()),
            (3, 2, 0.0.into()),
            (3, 3, 7.0.into()),
        ])
    }

    #[test]
    fn test_adjacent_plan() {
        let config = config(WritePolicy::Adjacent);
        let aliases = AliasTable::new(false);
        let writer = DashboardWriter::new(&config, &aliases);

        let sheet = block_sheet();
        let layout = writer.detect_layout(&sheet);
        let source = mapping(&[("Inventory", 100.0), ("Sales", 5.0), ("Cash", 9.0)]);

        let plan = writer.plan(&sheet, &layout, "A", &source).unwrap();
        let cells: Vec<_> = plan.writes.iter().map(|w| w.cell.to_string()).collect();
        assert_eq!(cells, vec!["B2", "B4"]);
        assert_eq!(plan.unplaced, vec!["Sales".to_string()]);
        assert_eq!(plan.unmatched, vec!["units".to_string()]);

        let plan = writer.plan(&sheet, &layout, "B", &source).unwrap();
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].cell.to_string(), "E2");
    }

    #[test]
    fn test_search_right_plan() {
        let config = config(WritePolicy::SearchRight);
        let aliases = AliasTable::new(false);
        let writer = DashboardWriter::new(&config, &aliases);

        let sheet = block_sheet();
        let layout = writer.detect_layout(&sheet);
        let source = mapping(&[("Inventory", 100.0), ("Cash", 9.0)]);

        let plan = writer.plan(&sheet, &layout, "A", &source).unwrap();
        let cells: Vec<_> = plan.writes.iter().map(|w| w.cell.to_string()).collect();
        // Cash goes to its placeholder in C4, never to firm B's D4
        assert_eq!(cells, vec!["B2", "C4"]);
    }
}
