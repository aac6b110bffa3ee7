use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use ndarray::{Array1, Array2};
use ndarray_npy::write_npy;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::database::{DatabaseFormat, TargetDatabase};
use crate::descriptor::DESCRIPTOR_BYTES;

#[derive(Parser, Debug, Clone)]
pub struct ExportCommand {
    /// 数据库路径
    pub database: PathBuf,
    /// 数据库格式，默认根据扩展名推断
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<DatabaseFormat>,
    /// 视觉词的输出路径，形状为 (词典大小, 64) 的 uint8 矩阵
    #[arg(long, default_value = "vocabulary.npy")]
    pub words: PathBuf,
    /// IDF 权重的输出路径
    #[arg(long, default_value = "idf.npy")]
    pub idf: PathBuf,
}

impl SubCommandExtend for ExportCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let format = self.format.unwrap_or_else(|| DatabaseFormat::from_path(&self.database));
        let db = TargetDatabase::load(&self.database, format)?;

        let words = &db.vocabulary.words;
        let data = words.iter().flatten().copied().collect::<Vec<u8>>();
        let words = Array2::from_shape_vec((words.len(), DESCRIPTOR_BYTES), data)?;
        write_npy(&self.words, &words)?;

        let idf = Array1::from_vec(db.vocabulary.idf_weights.clone());
        write_npy(&self.idf, &idf)?;

        info!("导出成功: {} 个视觉词 -> {}, {}", words.nrows(), self.words.display(), self.idf.display());
        Ok(())
    }
}
