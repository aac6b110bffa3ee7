use rayon::prelude::*;

use crate::descriptor::WordId;
use crate::vocabulary::{Vocabulary, VocabularyId};

/// 把 N 字节二进制描述子映射为视觉词 ID
pub trait Quantizer<const N: usize>: Sync {
    /// 视觉词数量
    fn nlist(&self) -> usize;

    /// 量化器所用词典的指纹
    fn vocabulary_id(&self) -> VocabularyId;

    /// 为单个描述子寻找最近的视觉词
    fn assign(&self, x: &[u8; N]) -> WordId;

    /// 批量量化，结果顺序与输入一致
    fn assign_batch(&self, x: &[[u8; N]]) -> Vec<WordId> {
        x.par_iter().map(|d| self.assign(d)).collect()
    }
}

/// 穷举扫描整个词典，复杂度为 O(词数 × 描述子位数)
impl<const N: usize> Quantizer<N> for Vocabulary<N> {
    fn nlist(&self) -> usize {
        self.len()
    }

    fn vocabulary_id(&self) -> VocabularyId {
        self.id()
    }

    fn assign(&self, x: &[u8; N]) -> WordId {
        self.nearest_word(x).0
    }
}
