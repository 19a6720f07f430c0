use std::path::Path;

use anyhow::Context;
use tabled::{Table, Tabled, settings::Style};
use tracing::info;
use uberize_core::{UberizeConfig, UberizeReport};

#[derive(Tabled)]
struct CollisionRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Used")]
    used: String,
    #[tabled(rename = "Ignored")]
    ignored: String,
}

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = UberizeConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let uberizer = config.build().context("invalid configuration")?;

    info!("Assembling {}...", config.output.display());
    let report = uberizer.uberize(&config.inputs, &config.output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &UberizeReport) {
    println!("Output:      {}", report.output.display());
    println!("Archives:    {}", report.archives);
    println!(
        "Entries:     {} extracted, {} filtered",
        report.entries_extracted, report.entries_filtered
    );
    println!(
        "Written:     {} files, {} directories",
        report.files_written, report.directories_written
    );
    println!("Relocated:   {} classes", report.class_relocations.len());

    if report.collisions.is_empty() {
        println!("No collisions.");
        return;
    }

    let origin = |blob: &Path, origin: &Option<String>| match origin {
        Some(origin) => origin.clone(),
        None => blob.display().to_string(),
    };
    let rows: Vec<CollisionRow> = report
        .collisions
        .iter()
        .map(|c| CollisionRow {
            path: c.path.clone(),
            used: origin(&c.used.blob, &c.used.origin),
            ignored: c
                .ignored
                .iter()
                .map(|s| origin(&s.blob, &s.origin))
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect();
    println!("\n{} collisions:", rows.len());
    println!("{}", Table::new(rows).with(Style::psql()).to_string());
}
