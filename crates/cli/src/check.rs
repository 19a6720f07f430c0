use std::path::Path;

use anyhow::Context;
use tabled::{Table, Tabled, settings::Style};
use uberize_core::{UberizeConfig, Uberizer};

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Stage")]
    description: String,
}

pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = UberizeConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let uberizer = config.build().context("invalid configuration")?;

    println!("Work dir: {}", config.work_dir.display());
    println!("Output:   {}", config.output.display());
    println!("Inputs:   {}", config.inputs.len());
    for input in &config.inputs {
        let marker = if input.is_file() { " " } else { "!" };
        println!("  {marker} {}", input.display());
    }

    let rows = stage_rows(&uberizer);
    if rows.is_empty() {
        println!("No transformers configured.");
    } else {
        println!("{}", Table::new(rows).with(Style::psql()).to_string());
    }
    Ok(())
}

fn stage_rows(uberizer: &Uberizer) -> Vec<StageRow> {
    uberizer
        .transformers()
        .iter()
        .enumerate()
        .map(|(i, t)| StageRow {
            position: i + 1,
            description: t.describe(),
        })
        .collect()
}
