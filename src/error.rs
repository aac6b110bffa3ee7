use thiserror::Error;

use crate::descriptor::WordId;

/// 构建索引过程中无法恢复的错误
///
/// 单张图片的失败不在此列，它们只会被记录并跳过。
#[derive(Debug, Error)]
pub enum BuildError {
    /// 所有图片都没有提取到特征点，没有可以索引的内容
    #[error("没有任何目标图片提取到可用的特征点")]
    NoUsableTargets,

    /// 词典为空时无法量化
    #[error("视觉词典为空")]
    EmptyVocabulary,

    /// 稀疏向量中出现了超出词典范围的词 ID
    #[error("词 ID {word} 超出词典范围 [0, {size})")]
    WordOutOfRange { word: WordId, size: usize },

    /// 词袋向量是用另一个词典量化的
    #[error("词袋向量与当前词典不一致，需要重新量化")]
    StaleVocabulary,

    /// 描述子长度与期望不符
    #[error("描述子长度不匹配：期望 {expected} 字节，实际 {actual} 字节")]
    DescriptorLength { expected: usize, actual: usize },
}
