//! dashfill-core: transcription of named financial metrics into a dashboard
//!
//! Every round of a competition comes with a financial summary workbook that
//! holds one sheet per firm. The [`Transcriber`] pairs each metric name on
//! those sheets with the value to its right, then writes the values into the
//! dashboard template next to the labels with the same name, on the year
//! sheet of the round and in the block of the firm.

pub mod aliases;
pub mod config;
pub mod error;
pub mod extractor;
pub mod reader;
pub mod report;
pub mod rounds;
pub mod writer;

use rayon::prelude::*;
use std::path::{Path, PathBuf};

pub use aliases::AliasTable;
pub use config::{ConfigSource, TransferConfig, WritePolicy};
pub use error::{Error, Result};
pub use extractor::{Extractor, MetricMapping, MetricRecord, ScanBounds};
pub use report::{Notice, NoticeScope, RoundReport, RunReport, Severity, UnitReport};
pub use rounds::RoundFile;
pub use writer::{DashboardWorkbook, DashboardWriter, YearLayout};

/// Per-run switches that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Output workbook; defaults to `output_dashboard_name` in the input directory
    pub output: Option<PathBuf>,
    /// Extract and match without saving the dashboard
    pub dry_run: bool,
}

/// Main transcription interface
pub struct Transcriber {
    config: TransferConfig,
    aliases: AliasTable,
}

impl Transcriber {
    pub fn new(config: TransferConfig, aliases: AliasTable) -> Self {
        Self { config, aliases }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Fill the dashboard from every round workbook found in `input_dir`
    ///
    /// Missing sheets, firm blocks and unreadable round files are recorded
    /// as notices and skipped. Errors that leave nothing to do (no round
    /// files, no template, a dashboard that cannot be written) are returned.
    pub fn run(&self, input_dir: &Path, options: &RunOptions) -> Result<RunReport> {
        let mut report = RunReport::default();

        let discovery = rounds::discover_rounds(input_dir, &self.config.input_prefix)?;
        for round in &discovery.rounds {
            tracing::info!("found {} (round {})", round.path.display(), round.round);
        }
        for (path, reason) in &discovery.ignored {
            report.push(Notice::warning(
                NoticeScope::Run,
                format!("ignoring {}: {}", path.display(), reason),
            ));
        }

        let mut dashboard = DashboardWorkbook::open(self.config.template_path(input_dir))?;
        let writer = DashboardWriter::new(&self.config, &self.aliases);
        let extractor = Extractor::from_config(&self.config);

        for round in &discovery.rounds {
            if let Some(round_report) =
                self.process_round(round, &mut dashboard, &writer, &extractor, &mut report)?
            {
                report.rounds.push(round_report);
            }
        }

        if options.dry_run {
            report.push(Notice::info(
                NoticeScope::Run,
                format!("dry run, {} cells not saved", dashboard.edit_count()),
            ));
            return Ok(report);
        }

        let output = options
            .output
            .clone()
            .unwrap_or_else(|| self.config.output_path(input_dir));
        dashboard.save(&output)?;
        report.output = Some(output);

        Ok(report)
    }

    fn process_round(
        &self,
        round: &RoundFile,
        dashboard: &mut DashboardWorkbook,
        writer: &DashboardWriter<'_>,
        extractor: &Extractor,
        report: &mut RunReport,
    ) -> Result<Option<RoundReport>> {
        let scope = NoticeScope::Round(round.round);
        let year_sheet = self.config.year_sheet_name(round.round);
        tracing::info!("round {}: {}", round.round, round.path.display());

        let layout = match dashboard.sheet(&year_sheet) {
            Some(sheet) => writer.detect_layout(sheet),
            None => {
                report.push(Notice::warning(
                    scope,
                    format!("dashboard has no sheet '{year_sheet}', round skipped"),
                ));
                return Ok(None);
            }
        };
        if layout.header_row.is_none() {
            report.push(Notice::warning(
                scope.clone(),
                format!(
                    "no '{}' header row on sheet '{}'",
                    self.config.firm_prefix.trim(),
                    year_sheet
                ),
            ));
        } else if layout.label_column.is_none() && self.config.write_policy == WritePolicy::FirmColumn
        {
            report.push(Notice::warning(
                scope.clone(),
                format!("no metric label column on sheet '{year_sheet}'"),
            ));
        }

        let firm_sheets: Vec<String> = self
            .config
            .firms
            .iter()
            .map(|firm| self.config.firm_sheet_name(firm))
            .collect();
        let source = match reader::read_workbook_sheets(&round.path, |name| {
            firm_sheets.iter().any(|sheet| sheet == name)
        }) {
            Ok(workbook) => workbook,
            Err(err) => {
                skip(report, scope, err, "round")?;
                return Ok(None);
            }
        };

        // Firms are independent; results keep the configured order
        let mappings: Vec<Result<MetricMapping>> = firm_sheets
            .par_iter()
            .map(|sheet| extractor.extract_from(&source, sheet))
            .collect();

        let mut round_report = RoundReport {
            round: round.round,
            source: round.path.clone(),
            year_sheet: year_sheet.clone(),
            units: Vec::new(),
        };

        for ((firm, sheet_name), mapping) in self.config.firms.iter().zip(&firm_sheets).zip(mappings) {
            let firm_scope = NoticeScope::Firm(round.round, firm.clone());

            let mapping = match mapping {
                Ok(mapping) => mapping,
                Err(err) => {
                    skip(report, firm_scope, err, "firm")?;
                    continue;
                }
            };
            if mapping.is_empty() {
                report.push(Notice::warning(
                    firm_scope,
                    format!("no metric values found on sheet '{sheet_name}'"),
                ));
                continue;
            }

            match writer.write_firm(dashboard, &layout, firm, &mapping) {
                Ok(unit) => {
                    tracing::info!(
                        "round {} firm {}: {} of {} metrics written",
                        round.round,
                        firm,
                        unit.written(),
                        unit.extracted
                    );
                    round_report.units.push(unit);
                }
                Err(err) => skip(report, firm_scope, err, "firm")?,
            }
        }

        Ok(Some(round_report))
    }
}

/// Record why a round or firm is skipped; fatal errors abort the run instead
fn skip(report: &mut RunReport, scope: NoticeScope, err: Error, unit: &str) -> Result<()> {
    if err.is_fatal() {
        return Err(err);
    }
    let notice = match err {
        Error::MissingSheet { .. } | Error::MissingFirmBlock { .. } => {
            Notice::warning(scope, format!("{err}, {unit} skipped"))
        }
        _ => Notice::error(scope, format!("{err}, {unit} skipped")),
    };
    report.push(notice);
    Ok(())
}
