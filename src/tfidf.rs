use rayon::prelude::*;

use crate::descriptor::WordId;
use crate::error::BuildError;
use crate::quantizer::Quantizer;
use crate::sparse::{Histogram, WeightVector};
use crate::vocabulary::{Vocabulary, VocabularyId};

/// 一张目标图片的词袋向量
#[derive(Debug, Clone)]
pub struct BagOfWords {
    vocabulary: VocabularyId,
    counts: Histogram,
    num_features: usize,
}

impl BagOfWords {
    /// 把一张图片的全部描述子量化为词频直方图
    pub fn quantize<const N: usize, Q: Quantizer<N>>(quantizer: &Q, descriptors: &[[u8; N]]) -> Self {
        let mut counts = Histogram::new();
        for d in descriptors {
            counts.add(quantizer.assign(d), 1);
        }
        Self { vocabulary: quantizer.vocabulary_id(), counts, num_features: descriptors.len() }
    }

    pub fn counts(&self) -> &Histogram {
        &self.counts
    }

    /// 参与量化的描述子数量
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn vocabulary_id(&self) -> VocabularyId {
        self.vocabulary
    }

    pub fn into_counts(self) -> Histogram {
        self.counts
    }
}

/// 文档频率：每个视觉词出现在多少张目标图片中
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFrequency {
    counts: Vec<u32>,
    num_docs: usize,
}

impl DocumentFrequency {
    /// 对所有直方图做并行归约，结果与图片顺序无关
    pub fn compute<'a, I>(vocab_size: usize, histograms: I) -> Result<Self, BuildError>
    where
        I: IntoParallelIterator<Item = &'a Histogram>,
    {
        let histograms: Vec<&Histogram> = histograms.into_par_iter().collect();
        histograms.par_iter().try_for_each(|h| h.check_range(vocab_size))?;

        let counts = histograms
            .par_iter()
            .fold(
                || vec![0u32; vocab_size],
                |mut acc, h| {
                    for w in h.keys() {
                        acc[w as usize] += 1;
                    }
                    acc
                },
            )
            .reduce(
                || vec![0u32; vocab_size],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );

        Ok(Self { counts, num_docs: histograms.len() })
    }

    pub fn get(&self, word: WordId) -> u32 {
        self.counts[word as usize]
    }

    /// 目标图片总数
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }
}

/// 逆文档频率权重，idf = ln((N + 1) / (df + 1))
///
/// 不截断到 0：几乎所有图片都包含的词，权重可以为负。
#[derive(Debug, Clone, PartialEq)]
pub struct IdfWeights(Vec<f64>);

impl IdfWeights {
    pub fn from_document_frequency(df: &DocumentFrequency) -> Self {
        let n = df.num_docs() as f64;
        Self(df.as_slice().iter().map(|&d| ((n + 1.0) / (d as f64 + 1.0)).ln()).collect())
    }

    /// 使用已经计算好的权重，例如从数据库加载时
    pub fn from_vec(weights: Vec<f64>) -> Self {
        Self(weights)
    }

    pub fn get(&self, word: WordId) -> f64 {
        self.0[word as usize]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// 计算 TF-IDF 向量，tf 以图片自身的特征点数量归一化
///
/// 结果与直方图的键完全相同，idf 为 0 的词也会保留。
pub fn tf_idf(counts: &Histogram, num_features: usize, idf: &IdfWeights) -> WeightVector {
    if num_features == 0 {
        return WeightVector::new();
    }
    counts
        .iter()
        .map(|(w, c)| {
            let tf = c as f64 / num_features as f64;
            (w, tf * idf.get(w))
        })
        .collect()
}

/// 倒排索引的统计部分：文档频率与 IDF 权重
///
/// 只接受由同一个词典量化出的词袋向量。
#[derive(Debug, Clone)]
pub struct InvertedIndex {
    vocabulary: VocabularyId,
    document_frequency: DocumentFrequency,
    idf: IdfWeights,
}

impl InvertedIndex {
    pub fn build<const N: usize>(
        vocabulary: &Vocabulary<N>,
        bows: &[BagOfWords],
    ) -> Result<Self, BuildError> {
        if bows.iter().any(|b| b.vocabulary != vocabulary.id()) {
            return Err(BuildError::StaleVocabulary);
        }
        let document_frequency =
            DocumentFrequency::compute(vocabulary.len(), bows.par_iter().map(|b| &b.counts))?;
        let idf = IdfWeights::from_document_frequency(&document_frequency);
        Ok(Self { vocabulary: vocabulary.id(), document_frequency, idf })
    }

    /// 为一张图片计算 TF-IDF 向量
    pub fn weigh(&self, bow: &BagOfWords) -> Result<WeightVector, BuildError> {
        if bow.vocabulary != self.vocabulary {
            return Err(BuildError::StaleVocabulary);
        }
        Ok(tf_idf(&bow.counts, bow.num_features, &self.idf))
    }

    pub fn document_frequency(&self) -> &DocumentFrequency {
        &self.document_frequency
    }

    pub fn idf(&self) -> &IdfWeights {
        &self.idf
    }

    pub fn into_idf(self) -> IdfWeights {
        self.idf
    }
}
