use std::fmt;

use log::{debug, info, warn};

use crate::descriptor::WordId;
use crate::error::BuildError;
use crate::hamming::nearest;
use crate::kmeans::{KMeansParams, binary_kmeans, imbalance_factor};

/// 词典参数
#[derive(Debug, Clone, Copy)]
pub struct VocabularyParams {
    /// 期望的视觉词数量
    pub size: usize,
    /// 分支因子，仅记录在元数据中
    pub branching_factor: usize,
    /// 层数，仅记录在元数据中
    pub levels: usize,
    pub kmeans: KMeansParams,
}

impl Default for VocabularyParams {
    fn default() -> Self {
        Self { size: 1000, branching_factor: 10, levels: 3, kmeans: KMeansParams::default() }
    }
}

/// 词典内容的指纹，用来识别词袋向量是由哪个词典量化得到的
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VocabularyId([u8; 32]);

impl fmt::Debug for VocabularyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VocabularyId(")?;
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// 视觉词典：固定数量的二进制聚类中心，下标即词 ID
///
/// 构建后不可修改，由各阶段以引用的方式共享。
#[derive(Debug, Clone)]
pub struct Vocabulary<const N: usize> {
    words: Vec<[u8; N]>,
    id: VocabularyId,
}

impl<const N: usize> Vocabulary<N> {
    /// 用所有目标图片汇总后的描述子构建词典
    ///
    /// 描述子数量少于期望的词数量时，词数量缩减为描述子数量。
    /// 此时每个描述子就是一个词，不再需要聚类。
    pub fn build(pooled: &[[u8; N]], params: &VocabularyParams) -> Result<Self, BuildError> {
        if pooled.is_empty() || params.size == 0 {
            return Err(BuildError::EmptyVocabulary);
        }

        if params.branching_factor.checked_pow(params.levels as u32) != Some(params.size) {
            debug!(
                "词典大小 {} 不等于 {}^{}",
                params.size, params.branching_factor, params.levels
            );
        }

        let mut size = params.size;
        if pooled.len() < size {
            warn!("描述子数量 ({}) 少于词典大小 ({})，词典大小缩减为 {}", pooled.len(), size, pooled.len());
            size = pooled.len();
        }

        let words = if size == pooled.len() {
            info!("描述子数量等于词典大小，直接使用全部 {size} 个描述子作为视觉词");
            pooled.to_vec()
        } else {
            info!("对 {} 个描述子进行聚类，视觉词数量 = {size}", pooled.len());
            let result = binary_kmeans::<N>(pooled, size, &params.kmeans, true);
            info!(
                "聚类完成，不平衡度：{:.2}，距离和：{:.2}",
                imbalance_factor(&result.centroid_frequency),
                result.distsum
            );
            result.centroids
        };

        Self::from_words(words)
    }

    /// 直接使用已有的视觉词，例如从数据库加载时
    pub fn from_words(words: Vec<[u8; N]>) -> Result<Self, BuildError> {
        if words.is_empty() {
            return Err(BuildError::EmptyVocabulary);
        }
        let mut hasher = blake3::Hasher::new();
        for w in &words {
            hasher.update(w);
        }
        let id = VocabularyId(*hasher.finalize().as_bytes());
        Ok(Self { words, id })
    }

    pub fn id(&self) -> VocabularyId {
        self.id
    }

    /// 视觉词数量，总是大于 0
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[[u8; N]] {
        &self.words
    }

    /// 返回距离最近的词的 ID，距离相同时取最小的 ID
    pub fn nearest_word(&self, x: &[u8; N]) -> (WordId, u32) {
        // 构造时保证了 words 非空
        let (idx, dis) = nearest(x, &self.words).unwrap_or((0, u32::MAX));
        (idx as WordId, dis)
    }
}
