mod common;

use calamine::Data;
use common::{Cell, OUTPUT, TEMPLATE, cell_value, create_mock_xlsx, read_zip_entry, read_zip_text, round_file};
use dashfill_core::{
    AliasTable, Error, NoticeScope, RunOptions, Severity, Transcriber, TransferConfig,
};
use std::fs;
use std::path::Path;

const YEAR_1: &[(&str, Cell)] = &[
    ("A1", Cell::Text("Dashboard")),
    ("B2", Cell::Text("FIRM A")),
    ("C2", Cell::Text("FIRM B")),
    ("D2", Cell::Text("FIRM G")),
    ("A3", Cell::Text("Inventory")),
    ("B3", Cell::Styled(0.0)),
    ("A4", Cell::Text("Beg. Inventory")),
    ("A5", Cell::Text("Net Income")),
    ("A6", Cell::Text("Ending Cash")),
    ("F10", Cell::Num(42.0)),
];

const YEAR_2: &[(&str, Cell)] = &[
    ("B2", Cell::Text("FIRM A")),
    ("C2", Cell::Text("FIRM B")),
    ("A3", Cell::Text("Inventory")),
];

const FIRM_A: &[(&str, Cell)] = &[
    ("B2", Cell::Text("Financial Details")),
    ("B5", Cell::Text("Inventory")),
    ("E5", Cell::Num(100.0)),
    ("B6", Cell::Text("Starting Inventory")),
    ("C6", Cell::Num(50.0)),
    ("B7", Cell::Text("Net Income")),
    ("C7", Cell::Text("(000s)")),
    ("D7", Cell::Num(12.5)),
];

const FIRM_B: &[(&str, Cell)] = &[("B5", Cell::Text("Inventory")), ("C5", Cell::Num(200.0))];

fn config() -> TransferConfig {
    TransferConfig {
        firms: vec!["A".to_string(), "B".to_string(), "G".to_string()],
        ..TransferConfig::default()
    }
}

fn aliases() -> AliasTable {
    let mut aliases = AliasTable::new(false);
    aliases.insert("Starting Inventory", "Beg. Inventory");
    aliases
}

/// Template with two year sheets and a round 1 workbook without firm G
fn setup(dir: &Path) -> anyhow::Result<()> {
    create_mock_xlsx(
        &dir.join(TEMPLATE),
        &[("Year 1", YEAR_1), ("Year 2", YEAR_2)],
        false,
    )?;
    create_mock_xlsx(
        &dir.join(round_file(1)),
        &[
            ("Financial Details for A", FIRM_A),
            ("Financial Details for B", FIRM_B),
        ],
        false,
    )?;
    Ok(())
}

#[test]
fn test_fills_dashboard_from_round() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;

    let report = Transcriber::new(config(), aliases()).run(dir.path(), &RunOptions::default())?;
    let output = dir.path().join(OUTPUT);
    assert_eq!(report.output.as_deref(), Some(output.as_path()));

    // Inventory sits three columns right of its name
    assert_eq!(cell_value(&output, "Year 1", "B3")?, Some(Data::Float(100.0)));
    // Starting Inventory reaches Beg. Inventory through the alias
    assert_eq!(cell_value(&output, "Year 1", "B4")?, Some(Data::Float(50.0)));
    assert_eq!(cell_value(&output, "Year 1", "B5")?, Some(Data::Float(12.5)));
    assert_eq!(cell_value(&output, "Year 1", "C3")?, Some(Data::Float(200.0)));
    assert_eq!(cell_value(&output, "Year 1", "C4")?, None);
    assert_eq!(cell_value(&output, "Year 1", "D3")?, None);

    let round = &report.rounds[0];
    assert_eq!(report.rounds.len(), 1);
    assert_eq!(round.year_sheet, "Year 1");
    assert_eq!(round.units.len(), 2);
    assert_eq!(round.units[0].written(), 3);
    assert_eq!(round.units[0].unmatched, vec!["Dashboard", "Ending Cash"]);
    assert_eq!(report.cells_written(), 4);

    // Firm G is skipped with a warning, nothing escapes the round
    assert!(!report.has_errors());
    let firm_g: Vec<_> = report
        .notices
        .iter()
        .filter(|n| n.scope == NoticeScope::Firm(1, "G".to_string()))
        .collect();
    assert_eq!(firm_g.len(), 1);
    assert_eq!(firm_g[0].severity, Severity::Warning);
    assert!(firm_g[0].message.contains("Financial Details for G"));
    Ok(())
}

#[test]
fn test_firm_without_block_is_skipped() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;
    // Year 2 has no FIRM G header although the round carries G's sheet
    create_mock_xlsx(
        &dir.path().join(round_file(2)),
        &[
            ("Financial Details for A", FIRM_A),
            ("Financial Details for B", FIRM_B),
            ("Financial Details for G", FIRM_B),
        ],
        false,
    )?;

    let report = Transcriber::new(config(), aliases()).run(dir.path(), &RunOptions::default())?;
    let output = dir.path().join(OUTPUT);

    assert_eq!(cell_value(&output, "Year 2", "B3")?, Some(Data::Float(100.0)));
    assert_eq!(cell_value(&output, "Year 2", "C3")?, Some(Data::Float(200.0)));
    assert_eq!(cell_value(&output, "Year 2", "D3")?, None);

    let round_2 = &report.rounds[1];
    assert_eq!(round_2.round, 2);
    assert_eq!(round_2.units.len(), 2);

    let firm_g: Vec<_> = report
        .notices
        .iter()
        .filter(|n| n.scope == NoticeScope::Firm(2, "G".to_string()))
        .collect();
    assert_eq!(firm_g.len(), 1);
    assert_eq!(firm_g[0].severity, Severity::Warning);
    assert!(firm_g[0].message.contains("FIRM G"));
    assert!(!report.has_errors());
    Ok(())
}

#[test]
fn test_untouched_content_is_preserved() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;
    let template = dir.path().join(TEMPLATE);

    Transcriber::new(config(), aliases()).run(dir.path(), &RunOptions::default())?;
    let output = dir.path().join(OUTPUT);

    assert_eq!(cell_value(&output, "Year 1", "F10")?, Some(Data::Float(42.0)));
    assert_eq!(
        cell_value(&output, "Year 1", "A4")?,
        Some(Data::String("Beg. Inventory".to_string()))
    );

    // The replaced cell keeps its style
    let sheet = read_zip_text(&output, "xl/worksheets/sheet1.xml")?;
    assert!(sheet.contains(r#"<c r="B3" s="1"><v>100</v></c>"#));

    // Parts without edits are copied byte for byte
    for part in ["xl/worksheets/sheet2.xml", "xl/styles.xml", "xl/workbook.xml"] {
        assert_eq!(read_zip_entry(&output, part)?, read_zip_entry(&template, part)?);
    }
    Ok(())
}

#[test]
fn test_runs_are_byte_identical() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;
    let transcriber = Transcriber::new(config(), aliases());

    let first = dir.path().join("first.xlsx");
    let second = dir.path().join("second.xlsx");
    for output in [&first, &second] {
        let options = RunOptions {
            output: Some(output.clone()),
            dry_run: false,
        };
        transcriber.run(dir.path(), &options)?;
    }

    assert_eq!(fs::read(&first)?, fs::read(&second)?);
    Ok(())
}

#[test]
fn test_missing_year_sheet_skips_round() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;
    create_mock_xlsx(
        &dir.path().join(round_file(3)),
        &[("Financial Details for A", FIRM_A)],
        false,
    )?;

    let report = Transcriber::new(config(), aliases()).run(dir.path(), &RunOptions::default())?;

    assert_eq!(report.rounds.len(), 1);
    let round_3: Vec<_> = report
        .notices
        .iter()
        .filter(|n| n.scope == NoticeScope::Round(3))
        .collect();
    assert_eq!(round_3.len(), 1);
    assert!(round_3[0].message.contains("Year 3"));
    assert!(!report.has_errors());
    Ok(())
}

#[test]
fn test_unreadable_round_is_an_error_notice() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;
    fs::write(dir.path().join(round_file(2)), b"not a workbook")?;

    let report = Transcriber::new(config(), aliases()).run(dir.path(), &RunOptions::default())?;

    assert!(report.has_errors());
    assert_eq!(report.rounds.len(), 1);
    assert!(report.notices.iter().any(|n| n.scope == NoticeScope::Round(2)
        && n.severity == Severity::Error));
    // Round 1 is still saved
    let output = dir.path().join(OUTPUT);
    assert_eq!(cell_value(&output, "Year 1", "B3")?, Some(Data::Float(100.0)));
    Ok(())
}

#[test]
fn test_dry_run_saves_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;

    let options = RunOptions {
        output: None,
        dry_run: true,
    };
    let report = Transcriber::new(config(), aliases()).run(dir.path(), &options)?;

    assert_eq!(report.output, None);
    assert_eq!(report.cells_written(), 4);
    assert!(!dir.path().join(OUTPUT).exists());
    Ok(())
}

#[test]
fn test_output_may_replace_template() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    setup(dir.path())?;
    let template = dir.path().join(TEMPLATE);

    let options = RunOptions {
        output: Some(template.clone()),
        dry_run: false,
    };
    Transcriber::new(config(), aliases()).run(dir.path(), &options)?;

    assert_eq!(cell_value(&template, "Year 1", "C3")?, Some(Data::Float(200.0)));
    Ok(())
}

#[test]
fn test_fatal_errors() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let transcriber = Transcriber::new(config(), aliases());

    let err = transcriber
        .run(dir.path(), &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::NoRoundFiles { .. }));

    create_mock_xlsx(
        &dir.path().join(round_file(1)),
        &[("Financial Details for A", FIRM_A)],
        false,
    )?;
    let err = transcriber
        .run(dir.path(), &RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::MissingFile { .. }));
    assert!(err.is_fatal());
    Ok(())
}
