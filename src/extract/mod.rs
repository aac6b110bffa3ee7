#[cfg(feature = "opencv")]
mod brisk;

use std::path::Path;

use anyhow::Result;
#[cfg(feature = "opencv")]
pub use brisk::BriskExtractor;

use crate::descriptor::Feature;
use crate::quality::ImageStats;

/// 从一张图片中提取到的全部特征点，以及图片的像素统计
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub stats: ImageStats,
    pub features: Vec<Feature>,
}

/// 特征点提取器
///
/// 每个工作线程持有一个实例，所以不要求 Sync。
/// 没有找到特征点时返回空的 features，而不是错误。
pub trait FeatureExtractor {
    fn extract(&mut self, path: &Path) -> Result<Extraction>;
}

/// 未启用 opencv 特性时的占位类型，无法被构造
#[cfg(not(feature = "opencv"))]
pub enum UnavailableExtractor {}

#[cfg(not(feature = "opencv"))]
impl FeatureExtractor for UnavailableExtractor {
    fn extract(&mut self, _path: &Path) -> Result<Extraction> {
        match *self {}
    }
}
