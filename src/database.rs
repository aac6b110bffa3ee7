use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, ensure};
use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use crate::descriptor::{DESCRIPTOR_BYTES, Descriptor, Feature, serde_descriptors};
use crate::quality::{
    ColorHistogram, ImageMeta, QualityMetrics, ScaleHints, SpatialLayout, TargetQuality, Validation,
};
use crate::sparse::{Histogram, WeightVector};
use crate::vocabulary::Vocabulary;

/// 数据库格式版本，字段变化时递增
pub const FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub num_targets: usize,
    pub vocabulary_size: usize,
    pub branching_factor: usize,
    pub levels: usize,
    pub descriptor_type: String,
    pub descriptor_bytes: usize,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyRecord {
    #[serde(with = "serde_descriptors")]
    pub words: Vec<Descriptor>,
    /// 与 words 一一对应
    pub idf_weights: Vec<f64>,
}

/// 一张目标图片的索引记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: String,
    pub filename: String,
    pub num_features: usize,
    pub keypoints: Vec<[f32; 2]>,
    #[serde(with = "serde_descriptors")]
    pub descriptors: Vec<Descriptor>,
    pub bow: Histogram,
    pub bow_tfidf: WeightVector,
    pub image_meta: ImageMeta,
    pub quality_metrics: QualityMetrics,
    pub color_histogram: ColorHistogram,
    pub spatial_layout: SpatialLayout,
    pub scale_hints: ScaleHints,
    pub validation: Validation,
}

impl TargetRecord {
    pub fn new(
        id: String,
        filename: String,
        features: &[Feature],
        bow: Histogram,
        bow_tfidf: WeightVector,
        quality: TargetQuality,
    ) -> Self {
        Self {
            id,
            filename,
            num_features: features.len(),
            keypoints: features.iter().map(|f| [f.keypoint.x, f.keypoint.y]).collect(),
            descriptors: features.iter().map(|f| f.descriptor).collect(),
            bow,
            bow_tfidf,
            image_meta: quality.image_meta,
            quality_metrics: quality.quality_metrics,
            color_histogram: quality.color_histogram,
            spatial_layout: quality.spatial_layout,
            scale_hints: quality.scale_hints,
            validation: quality.validation,
        }
    }
}

/// 运行时使用的目标数据库，是离线构建的唯一产物
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDatabase {
    pub metadata: DatabaseMetadata,
    pub vocabulary: VocabularyRecord,
    pub targets: Vec<TargetRecord>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseFormat {
    /// 便于 JavaScript 运行时直接读取
    Json,
    /// 体积更小，读写更快
    Bincode,
}

impl DatabaseFormat {
    /// 根据扩展名推断格式，.bin 和 .bincode 为 bincode，其余为 JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") || ext.eq_ignore_ascii_case("bincode") => {
                Self::Bincode
            }
            _ => Self::Json,
        }
    }
}

impl TargetDatabase {
    pub fn vocabulary(&self) -> Result<Vocabulary<DESCRIPTOR_BYTES>> {
        Ok(Vocabulary::from_words(self.vocabulary.words.clone())?)
    }

    /// 所有目标的特征点总数
    pub fn total_features(&self) -> usize {
        self.targets.iter().map(|t| t.num_features).sum()
    }

    /// 检查数据库内部的一致性
    pub fn validate(&self) -> Result<()> {
        let meta = &self.metadata;
        ensure!(
            meta.format_version <= FORMAT_VERSION,
            "不支持的数据库版本 {}，当前最高支持 {}",
            meta.format_version,
            FORMAT_VERSION
        );
        ensure!(
            meta.descriptor_bytes == DESCRIPTOR_BYTES,
            "描述子长度为 {} 字节，期望 {} 字节",
            meta.descriptor_bytes,
            DESCRIPTOR_BYTES
        );
        let size = self.vocabulary.words.len();
        ensure!(size > 0, "视觉词典为空");
        ensure!(
            meta.vocabulary_size == size && self.vocabulary.idf_weights.len() == size,
            "词典大小不一致：元数据 {}，视觉词 {}，IDF 权重 {}",
            meta.vocabulary_size,
            size,
            self.vocabulary.idf_weights.len()
        );
        ensure!(
            meta.num_targets == self.targets.len(),
            "目标数量不一致：元数据 {}，实际 {}",
            meta.num_targets,
            self.targets.len()
        );

        for t in &self.targets {
            ensure!(
                t.keypoints.len() == t.num_features && t.descriptors.len() == t.num_features,
                "目标 {} 的特征点数量不一致",
                t.id
            );
            t.bow.check_range(size).with_context(|| format!("目标 {}", t.id))?;
            t.bow_tfidf.check_range(size).with_context(|| format!("目标 {}", t.id))?;
            ensure!(t.bow.keys().eq(t.bow_tfidf.keys()), "目标 {} 的词袋与 TF-IDF 向量的键不一致", t.id);
        }
        Ok(())
    }

    pub fn save(&self, path: &Path, format: DatabaseFormat) -> Result<()> {
        // 先写入临时文件，成功后再替换，避免留下写了一半的数据库
        let mut tmp_file = path.as_os_str().to_owned();
        tmp_file.push(".tmp");
        let tmp_file = Path::new(&tmp_file);

        let file = File::create(tmp_file)
            .with_context(|| format!("无法创建文件: {}", tmp_file.display()))?;
        let mut writer = BufWriter::new(file);
        match format {
            DatabaseFormat::Json => serde_json::to_writer_pretty(&mut writer, self)?,
            DatabaseFormat::Bincode => bincode::serialize_into(&mut writer, self)?,
        }
        writer.flush()?;
        drop(writer);
        std::fs::rename(tmp_file, path)?;

        let size = std::fs::metadata(path)?.len() as f64 / (1024. * 1024.);
        info!("数据库已写入 {}（{:.2} MB）", path.display(), size);
        Ok(())
    }

    pub fn load(path: &Path, format: DatabaseFormat) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("无法打开数据库: {}", path.display()))?;
        let reader = BufReader::new(file);
        let db: Self = match format {
            DatabaseFormat::Json => serde_json::from_reader(reader)?,
            DatabaseFormat::Bincode => bincode::deserialize_from(reader)?,
        };
        db.validate()?;
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::descriptor::KeyPoint;
    use crate::quality::ImageStats;

    fn sample_db() -> TargetDatabase {
        let quality = TargetQuality::assess(&ImageStats::default(), &[]);
        let feature = Feature::new(KeyPoint::new(1.0, 2.0, 0.5), [7u8; DESCRIPTOR_BYTES]);
        let target = TargetRecord::new(
            "a".to_string(),
            "a.png".to_string(),
            &[feature],
            [(0, 1)].into_iter().collect(),
            [(0, 0.0)].into_iter().collect(),
            quality,
        );
        TargetDatabase {
            metadata: DatabaseMetadata {
                num_targets: 1,
                vocabulary_size: 1,
                branching_factor: 10,
                levels: 3,
                descriptor_type: "BRISK".to_string(),
                descriptor_bytes: DESCRIPTOR_BYTES,
                format_version: FORMAT_VERSION,
            },
            vocabulary: VocabularyRecord { words: vec![[7u8; DESCRIPTOR_BYTES]], idf_weights: vec![0.0] },
            targets: vec![target],
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DatabaseFormat::from_path(Path::new("db.json")), DatabaseFormat::Json);
        assert_eq!(DatabaseFormat::from_path(Path::new("db.BIN")), DatabaseFormat::Bincode);
        assert_eq!(DatabaseFormat::from_path(Path::new("db")), DatabaseFormat::Json);
    }

    #[test]
    fn test_save_load_both_formats() {
        let dir = TempDir::new().unwrap();
        let db = sample_db();
        for (name, format) in [("db.json", DatabaseFormat::Json), ("db.bin", DatabaseFormat::Bincode)] {
            let path = dir.path().join(name);
            db.save(&path, format).unwrap();
            assert_eq!(TargetDatabase::load(&path, format).unwrap(), db);
        }
    }

    #[test]
    fn test_json_field_names() {
        let value = serde_json::to_value(sample_db()).unwrap();
        let target = &value["targets"][0];
        for key in [
            "id",
            "filename",
            "num_features",
            "keypoints",
            "descriptors",
            "bow",
            "bow_tfidf",
            "image_meta",
            "quality_metrics",
            "color_histogram",
            "spatial_layout",
            "scale_hints",
            "validation",
        ] {
            assert!(target.get(key).is_some(), "缺少字段 {key}");
        }
        assert_eq!(value["metadata"]["descriptor_bytes"], 64);
        assert_eq!(target["bow"]["0"], 1);
        assert_eq!(value["vocabulary"]["words"][0].as_array().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_format_version_defaults() {
        let mut value = serde_json::to_value(sample_db()).unwrap();
        value["metadata"].as_object_mut().unwrap().remove("format_version");
        let db: TargetDatabase = serde_json::from_value(value).unwrap();
        assert_eq!(db.metadata.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_validate_rejects_inconsistent() {
        let mut db = sample_db();
        db.vocabulary.idf_weights.push(1.0);
        assert!(db.validate().is_err());

        let mut db = sample_db();
        db.targets[0].bow.insert(3, 1);
        assert!(db.validate().is_err());

        let mut db = sample_db();
        db.metadata.num_targets = 2;
        assert!(db.validate().is_err());
    }
}
