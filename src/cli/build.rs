use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::Parser;
use log::info;

use crate::builder::IndexBuilder;
use crate::cli::SubCommandExtend;
use crate::config::{BriskOptions, BudgetOptions, Opts, VocabOptions};
use crate::database::DatabaseFormat;
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    #[command(flatten)]
    pub brisk: BriskOptions,
    #[command(flatten)]
    pub budget: BudgetOptions,
    #[command(flatten)]
    pub vocab: VocabOptions,
    /// 目标图片所在目录
    pub input: PathBuf,
    /// 输出的数据库路径
    #[arg(short, long, default_value = "target_database.json")]
    pub output: PathBuf,
    /// 数据库格式，默认根据扩展名推断
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<DatabaseFormat>,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,bmp")]
    pub suffix: String,
    /// 递归扫描子目录
    #[arg(short, long)]
    pub recursive: bool,
}

impl SubCommandExtend for BuildCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        ensure!(self.input.is_dir(), "目录不存在: {}", self.input.display());
        let re_suf = utils::suffix_regex(&self.suffix)?;
        let images = utils::scan_images(&self.input, &re_suf, self.recursive);

        let builder = IndexBuilder::new((&self.budget).into(), (&self.vocab).into());
        let db = builder.build_from_images(&images, || self.create_extractor())?;

        let format = self.format.unwrap_or_else(|| DatabaseFormat::from_path(&self.output));
        db.save(&self.output, format)?;
        info!(
            "构建完成：{} 个目标，{} 个视觉词，{} 个特征点",
            db.metadata.num_targets,
            db.metadata.vocabulary_size,
            db.total_features()
        );
        Ok(())
    }
}

impl BuildCommand {
    #[cfg(feature = "opencv")]
    fn create_extractor(&self) -> Result<crate::extract::BriskExtractor> {
        crate::extract::BriskExtractor::create(&self.brisk)
    }

    #[cfg(not(feature = "opencv"))]
    fn create_extractor(&self) -> Result<crate::extract::UnavailableExtractor> {
        anyhow::bail!("未启用 opencv 特性，无法提取 BRISK 特征点")
    }
}
