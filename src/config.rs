use clap::{Parser, Subcommand};

use crate::budget::FeatureBudget;
use crate::cli::*;
use crate::kmeans::KMeansParams;
use crate::vocabulary::VocabularyParams;

#[derive(Parser, Debug, Clone)]
pub struct BriskOptions {
    /// BRISK FAST/AGAST 检测阈值
    #[arg(long, value_name = "THRESHOLD", default_value_t = 50)]
    pub brisk_thresh: i32,
    /// BRISK 检测的八度数量
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub brisk_octaves: i32,
    /// BRISK 采样模式的缩放比例
    #[arg(long, value_name = "SCALE", default_value_t = 1.0)]
    pub brisk_pattern_scale: f32,
}

#[derive(Parser, Debug, Clone)]
pub struct BudgetOptions {
    /// 每张目标图片最多保留的特征点数量
    #[arg(short = 'n', long, value_name = "N", default_value_t = 500)]
    pub max_features: usize,
    /// 筛选特征点时的网格边长，图片被划分为 N×N 个格子
    #[arg(long, value_name = "N", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub grid_size: u16,
}

impl From<&BudgetOptions> for FeatureBudget {
    fn from(opts: &BudgetOptions) -> Self {
        FeatureBudget::new(opts.max_features, opts.grid_size as usize)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct VocabOptions {
    /// 视觉词数量，描述子不足时会自动缩减
    #[arg(long, value_name = "N", default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub vocab_size: u32,
    /// 词典树的分支因子，只记录在元数据中
    #[arg(long, value_name = "K", default_value_t = 10)]
    pub branching_factor: usize,
    /// 词典树的层数，只记录在元数据中
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub levels: usize,
    /// kmeans 最大迭代次数
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub max_iter: usize,
    /// kmeans 每个批次的描述子数量
    #[arg(long, value_name = "SIZE", default_value_t = 1000)]
    pub batch_size: usize,
    /// kmeans 随机数种子
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<&VocabOptions> for VocabularyParams {
    fn from(opts: &VocabOptions) -> Self {
        VocabularyParams {
            size: opts.vocab_size as usize,
            branching_factor: opts.branching_factor,
            levels: opts.levels,
            kmeans: KMeansParams {
                max_iter: opts.max_iter,
                batch_size: opts.batch_size,
                seed: opts.seed,
            },
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "vocabtree", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 从目标图片目录构建词典与 TF-IDF 数据库
    Build(BuildCommand),
    /// 显示数据库摘要
    Show(ShowCommand),
    /// 将词典和 IDF 权重导出为 npy 文件
    Export(ExportCommand),
}
