use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::budget::FeatureBudget;
use crate::database::{DatabaseMetadata, FORMAT_VERSION, TargetDatabase, TargetRecord, VocabularyRecord};
use crate::descriptor::{DESCRIPTOR_BYTES, Descriptor, Feature};
use crate::error::BuildError;
use crate::extract::{Extraction, FeatureExtractor};
use crate::quality::TargetQuality;
use crate::tfidf::{BagOfWords, InvertedIndex};
use crate::utils::{TargetIds, pb_style};
use crate::vocabulary::{Vocabulary, VocabularyParams};

/// 一张已筛选过特征点的目标图片
#[derive(Debug, Clone)]
pub struct TargetFeatures {
    pub id: String,
    pub filename: String,
    /// 筛选后的特征点
    pub features: Vec<Feature>,
    /// 基于筛选前全部特征点的质量评估
    pub quality: TargetQuality,
}

impl TargetFeatures {
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.features.iter().map(|f| f.descriptor).collect()
    }
}

/// 离线构建目标数据库
///
/// 流程分为三段：各图片独立地提取并筛选特征点；汇总全部描述子构建词典；
/// 词典确定后各图片独立地量化，最后统计文档频率并计算 TF-IDF。
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    budget: FeatureBudget,
    vocab: VocabularyParams,
    descriptor_type: String,
}

impl IndexBuilder {
    pub fn new(budget: FeatureBudget, vocab: VocabularyParams) -> Self {
        Self { budget, vocab, descriptor_type: "BRISK".to_string() }
    }

    /// 写入元数据的描述子类型
    pub fn descriptor_type(mut self, name: impl Into<String>) -> Self {
        self.descriptor_type = name.into();
        self
    }

    /// 评估质量并筛选特征点，没有特征点时返回 None
    pub fn prepare_target(
        &self,
        id: impl Into<String>,
        filename: impl Into<String>,
        extraction: Extraction,
    ) -> Option<TargetFeatures> {
        if extraction.features.is_empty() {
            return None;
        }
        let Extraction { stats, features } = extraction;
        let keypoints = features.iter().map(|f| f.keypoint).collect::<Vec<_>>();
        let quality = TargetQuality::assess(&stats, &keypoints);
        let features = self.budget.select(features, stats.width, stats.height);
        Some(TargetFeatures { id: id.into(), filename: filename.into(), features, quality })
    }

    /// 并行提取所有图片的特征点
    ///
    /// 每个工作线程调用一次 make_extractor。读取失败、没有特征点或内容重复的图片会被跳过。
    pub fn extract_targets<E, F>(&self, paths: &[PathBuf], make_extractor: F) -> Vec<TargetFeatures>
    where
        E: FeatureExtractor,
        F: Fn() -> Result<E> + Sync + Send,
    {
        let mut ids = TargetIds::default();
        let jobs = paths.iter().map(|p| (p, ids.assign(p))).collect::<Vec<_>>();

        let pb = ProgressBar::new(jobs.len() as u64).with_style(pb_style());
        pb.set_message("提取特征点");
        let results = jobs
            .par_iter()
            .progress_with(pb.clone())
            .map_init(&make_extractor, |extractor, (path, id)| {
                let extractor = match extractor {
                    Ok(extractor) => extractor,
                    Err(e) => {
                        pb.suspend(|| warn!("[SKIP] {}: 无法创建特征点提取器: {e:#}", path.display()));
                        return None;
                    }
                };
                match self.extract_one(extractor, path, id) {
                    Ok(Some(target)) => Some(target),
                    Ok(None) => {
                        pb.suspend(|| warn!("[SKIP] {}: 未找到特征点", path.display()));
                        None
                    }
                    Err(e) => {
                        pb.suspend(|| warn!("[SKIP] {}: {e:#}", path.display()));
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        pb.finish_with_message("特征点提取完成");

        let mut seen = HashSet::new();
        let mut targets = vec![];
        for (hash, target) in results.into_iter().flatten() {
            if !seen.insert(hash) {
                warn!("[SKIP] {}: 与已添加的图片内容相同", target.filename);
                continue;
            }
            debug!("{}: {} 个特征点", target.id, target.features.len());
            targets.push(target);
        }
        info!("{} 张图片中有 {} 张可用", paths.len(), targets.len());
        targets
    }

    fn extract_one<E: FeatureExtractor>(
        &self,
        extractor: &mut E,
        path: &Path,
        id: &str,
    ) -> Result<Option<(blake3::Hash, TargetFeatures)>> {
        let hash = blake3::hash(&std::fs::read(path)?);
        let extraction = extractor.extract(path)?;
        let filename = path.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(self.prepare_target(id, filename, extraction).map(|t| (hash, t)))
    }

    /// 用已筛选的目标构建数据库
    pub fn build(&self, targets: Vec<TargetFeatures>) -> Result<TargetDatabase, BuildError> {
        let targets = targets
            .into_iter()
            .filter(|t| {
                if t.features.is_empty() {
                    warn!("[SKIP] {}: 未找到特征点", t.id);
                }
                !t.features.is_empty()
            })
            .collect::<Vec<_>>();
        if targets.is_empty() {
            return Err(BuildError::NoUsableTargets);
        }

        let pooled = targets.iter().flat_map(|t| t.features.iter().map(|f| f.descriptor)).collect::<Vec<_>>();
        info!("共 {} 个目标，{} 个描述子", targets.len(), pooled.len());

        // 词典是唯一的同步点，之后的量化都共享同一个只读词典
        let vocabulary = Vocabulary::<DESCRIPTOR_BYTES>::build(&pooled, &self.vocab)?;
        drop(pooled);
        info!("词典构建完成：{} 个视觉词", vocabulary.len());

        let pb = ProgressBar::new(targets.len() as u64).with_style(pb_style());
        pb.set_message("量化描述子");
        let bows = targets
            .par_iter()
            .progress_with(pb.clone())
            .map(|t| BagOfWords::quantize(&vocabulary, &t.descriptors()))
            .collect::<Vec<_>>();
        pb.finish_with_message("量化完成");

        let index = InvertedIndex::build(&vocabulary, &bows)?;

        let mut records = Vec::with_capacity(targets.len());
        for (t, bow) in targets.into_iter().zip(bows) {
            let tfidf = index.weigh(&bow)?;
            debug!("{}: {} 个不同的视觉词", t.id, bow.counts().len());
            records.push(TargetRecord::new(t.id, t.filename, &t.features, bow.into_counts(), tfidf, t.quality));
        }

        let metadata = DatabaseMetadata {
            num_targets: records.len(),
            vocabulary_size: vocabulary.len(),
            branching_factor: self.vocab.branching_factor,
            levels: self.vocab.levels,
            descriptor_type: self.descriptor_type.clone(),
            descriptor_bytes: DESCRIPTOR_BYTES,
            format_version: FORMAT_VERSION,
        };
        let vocabulary = VocabularyRecord {
            words: vocabulary.words().to_vec(),
            idf_weights: index.into_idf().as_slice().to_vec(),
        };

        Ok(TargetDatabase { metadata, vocabulary, targets: records })
    }

    /// 提取并构建，没有任何可用图片时返回 NoUsableTargets
    pub fn build_from_images<E, F>(&self, paths: &[PathBuf], make_extractor: F) -> Result<TargetDatabase>
    where
        E: FeatureExtractor,
        F: Fn() -> Result<E> + Sync + Send,
    {
        let targets = self.extract_targets(paths, make_extractor);
        Ok(self.build(targets)?)
    }
}
