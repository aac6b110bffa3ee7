use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::database::{DatabaseFormat, DatabaseMetadata, TargetDatabase};

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// 数据库路径
    pub database: PathBuf,
    /// 数据库格式，默认根据扩展名推断
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<DatabaseFormat>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Serialize)]
struct TargetSummary<'a> {
    id: &'a str,
    filename: &'a str,
    num_features: usize,
    unique_words: usize,
    distinctiveness: f64,
    recommended: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    metadata: &'a DatabaseMetadata,
    total_features: usize,
    targets: Vec<TargetSummary<'a>>,
}

impl SubCommandExtend for ShowCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let format = self.format.unwrap_or_else(|| DatabaseFormat::from_path(&self.database));
        let db = TargetDatabase::load(&self.database, format)?;
        let summary = Summary {
            metadata: &db.metadata,
            total_features: db.total_features(),
            targets: db
                .targets
                .iter()
                .map(|t| TargetSummary {
                    id: &t.id,
                    filename: &t.filename,
                    num_features: t.num_features,
                    unique_words: t.bow.len(),
                    distinctiveness: t.quality_metrics.distinctiveness,
                    recommended: t.quality_metrics.recommended,
                })
                .collect(),
        };
        print_summary(&summary, self.output_format)
    }
}

fn print_summary(summary: &Summary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?)
        }
        OutputFormat::Table => {
            let meta = summary.metadata;
            println!("descriptor   : {} ({} bytes)", meta.descriptor_type, meta.descriptor_bytes);
            println!("vocabulary   : {} (k={}, levels={})", meta.vocabulary_size, meta.branching_factor, meta.levels);
            println!("targets      : {}", meta.num_targets);
            println!("features     : {}", summary.total_features);
            println!();
            for t in &summary.targets {
                println!(
                    "{}\t{}\t{}\t{:.2}\t{}\t{}",
                    t.num_features,
                    t.unique_words,
                    if t.recommended { "ok" } else { "weak" },
                    t.distinctiveness,
                    t.id,
                    t.filename
                );
            }
        }
    }
    Ok(())
}
