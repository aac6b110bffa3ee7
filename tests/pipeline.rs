use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rstest::*;
use tempfile::TempDir;
use vocabtree::budget::FeatureBudget;
use vocabtree::descriptor::{DESCRIPTOR_BYTES, Descriptor, Feature, KeyPoint};
use vocabtree::extract::{Extraction, FeatureExtractor};
use vocabtree::quality::ImageStats;
use vocabtree::vocabulary::VocabularyParams;
use vocabtree::{BuildError, DatabaseFormat, IndexBuilder, TargetDatabase, TargetFeatures};

/// 按文件名返回预先设定的特征点
struct TableExtractor<'a> {
    table: &'a HashMap<String, Extraction>,
}

impl FeatureExtractor for TableExtractor<'_> {
    fn extract(&mut self, path: &Path) -> Result<Extraction> {
        let name = path.file_name().unwrap().to_string_lossy();
        self.table.get(name.as_ref()).cloned().with_context(|| format!("无法读取图片: {name}"))
    }
}

fn word(b: u8) -> Descriptor {
    [b; DESCRIPTOR_BYTES]
}

fn stats() -> ImageStats {
    ImageStats { width: 100, height: 100, blur_score: 150.0, contrast_score: 0.4, hue_histogram: vec![0.0; 16] }
}

fn target(id: &str, words: &[Descriptor]) -> TargetFeatures {
    let extraction = Extraction {
        stats: stats(),
        features: words
            .iter()
            .enumerate()
            .map(|(i, &d)| Feature::new(KeyPoint::new(i as f32 * 10.0, 50.0, 1.0), d))
            .collect(),
    };
    builder(words.len().max(1)).prepare_target(id, format!("{id}.png"), extraction).unwrap()
}

fn builder(vocab_size: usize) -> IndexBuilder {
    IndexBuilder::new(FeatureBudget::default(), VocabularyParams { size: vocab_size, ..Default::default() })
}

#[rstest]
fn test_three_targets_with_distinct_words() {
    let targets = vec![
        target("a", &[word(0x00), word(0x0f)]),
        target("b", &[word(0xf0)]),
        target("c", &[word(0xff)]),
    ];
    let db = builder(4).build(targets).unwrap();

    assert_eq!(db.metadata.num_targets, 3);
    assert_eq!(db.metadata.vocabulary_size, 4);
    assert_eq!(db.vocabulary.words, vec![word(0x00), word(0x0f), word(0xf0), word(0xff)]);

    // 每个词都只出现在一个目标中
    let idf = (4.0f64 / 2.0).ln();
    for w in &db.vocabulary.idf_weights {
        assert!((w - idf).abs() < 1e-12);
    }

    let a = &db.targets[0];
    assert_eq!(a.bow.get(0), 1);
    assert_eq!(a.bow.get(1), 1);
    assert_eq!(a.bow.len(), 2);
    assert!((a.bow_tfidf.get(0) - 0.5 * idf).abs() < 1e-12);
    assert!((db.targets[1].bow_tfidf.get(2) - idf).abs() < 1e-12);
    db.validate().unwrap();
}

#[rstest]
fn test_duplicate_words_resolve_to_lowest_id() {
    let targets = vec![target("a", &[word(1), word(1)]), target("b", &[word(1), word(2)])];
    let db = builder(4).build(targets).unwrap();

    // 视觉词为 [1, 1, 1, 2]，重复的词只会命中第一个
    assert_eq!(db.targets[0].bow.iter().collect::<Vec<_>>(), vec![(0, 2)]);
    assert_eq!(db.targets[1].bow.iter().collect::<Vec<_>>(), vec![(0, 1), (3, 1)]);

    let idf = &db.vocabulary.idf_weights;
    assert_eq!(idf[0], 0.0);
    assert!((idf[1] - 3f64.ln()).abs() < 1e-12);
    assert!((idf[2] - 3f64.ln()).abs() < 1e-12);
    assert!((idf[3] - 1.5f64.ln()).abs() < 1e-12);

    // 出现在所有目标中的词权重为 0，但仍然保留
    assert_eq!(db.targets[0].bow_tfidf.iter().collect::<Vec<_>>(), vec![(0, 0.0)]);
}

#[rstest]
fn test_vocabulary_shrinks_to_descriptor_count() {
    let db = builder(1000).build(vec![target("only", &[word(7)])]).unwrap();
    assert_eq!(db.metadata.vocabulary_size, 1);
    assert_eq!(db.vocabulary.words, vec![word(7)]);
    assert_eq!(db.vocabulary.idf_weights, vec![0.0]);
    assert_eq!(db.targets[0].bow_tfidf.iter().collect::<Vec<_>>(), vec![(0, 0.0)]);
}

#[rstest]
fn test_clustering_assigns_every_descriptor() {
    let words = (0..40u8).map(|i| if i % 2 == 0 { word(0x00) } else { word(0xff) }).collect::<Vec<_>>();
    let targets = vec![target("a", &words[..20]), target("b", &words[20..])];
    let db = builder(2).build(targets).unwrap();

    assert_eq!(db.vocabulary.words.len(), 2);
    for t in &db.targets {
        assert_eq!(t.bow.total(), 20);
        assert_eq!(t.bow.keys().collect::<Vec<_>>(), t.bow_tfidf.keys().collect::<Vec<_>>());
    }
    db.validate().unwrap();
}

/// 三个目标各 12 个描述子，其中一半是共享的 word(0x00)
fn shared_word_targets() -> Vec<TargetFeatures> {
    [("a", 0x0f), ("b", 0xf0), ("c", 0xff)]
        .into_iter()
        .map(|(id, b)| {
            let words = [[word(0x00); 6], [word(b); 6]].concat();
            target(id, &words)
        })
        .collect()
}

#[rstest]
fn test_clustered_word_shared_by_all_targets() {
    let db = builder(4).build(shared_word_targets()).unwrap();

    assert_eq!(db.metadata.vocabulary_size, 4);
    assert_eq!(db.vocabulary.words.len(), 4);
    for t in &db.targets {
        assert!(t.bow.keys().all(|k| k < 4), "{:?}", t.bow);
        assert_eq!(t.bow.total(), 12);
    }

    // 相同的描述子总是量化到同一个词，该词出现在所有目标中，IDF 为 0
    let (w, _) = db.vocabulary().unwrap().nearest_word(&word(0x00));
    for t in &db.targets {
        assert!(t.bow.get(w) >= 6);
        assert_eq!(t.bow_tfidf.get(w), 0.0);
    }
    assert_eq!(db.vocabulary.idf_weights[w as usize], 0.0);
    db.validate().unwrap();
}

#[rstest]
fn test_same_seed_same_vocabulary() {
    let db1 = builder(4).build(shared_word_targets()).unwrap();
    let db2 = builder(4).build(shared_word_targets()).unwrap();
    assert_eq!(db1.vocabulary().unwrap().id(), db2.vocabulary().unwrap().id());
    assert_eq!(db1.vocabulary.idf_weights, db2.vocabulary.idf_weights);
}

#[rstest]
fn test_no_targets_is_fatal() {
    assert!(matches!(builder(4).build(vec![]), Err(BuildError::NoUsableTargets)));
}

#[rstest]
fn test_budget_applies_after_quality() {
    let features = (0..50)
        .map(|i| Feature::new(KeyPoint::new((i % 10) as f32 * 10.0, (i / 10) as f32 * 20.0, i as f32), word(i as u8)))
        .collect();
    let builder = IndexBuilder::new(FeatureBudget::new(8, 2), VocabularyParams::default());
    let t = builder.prepare_target("t", "t.png", Extraction { stats: stats(), features }).unwrap();

    assert_eq!(t.features.len(), 8);
    assert_eq!(t.quality.spatial_layout.grid_8x8.iter().sum::<u32>(), 50);
    assert_eq!(t.quality.quality_metrics.feature_density, 50.0);
}

#[rstest]
fn test_empty_extraction_is_skipped() {
    let b = builder(4);
    assert!(b.prepare_target("e", "e.png", Extraction { stats: stats(), features: vec![] }).is_none());
}

#[fixture]
fn image_dir() -> (TempDir, Vec<PathBuf>, HashMap<String, Extraction>) {
    let dir = TempDir::new().unwrap();
    let mut table = HashMap::new();
    let mut paths = vec![];
    let files: [(&str, &[u8], Option<Vec<Descriptor>>); 5] = [
        ("a.png", b"image a", Some(vec![word(1), word(2)])),
        ("b.png", b"image b", Some(vec![word(3)])),
        ("bad.png", b"broken", None),
        ("copy.png", b"image a", Some(vec![word(1), word(2)])),
        ("empty.png", b"no features", Some(vec![])),
    ];
    for (name, content, words) in files {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        if let Some(words) = words {
            let features = words.into_iter().map(|d| Feature::new(KeyPoint::new(1.0, 1.0, 1.0), d)).collect();
            table.insert(name.to_string(), Extraction { stats: stats(), features });
        }
        paths.push(path);
    }
    (dir, paths, table)
}

#[rstest]
fn test_extract_skips_unusable_images(image_dir: (TempDir, Vec<PathBuf>, HashMap<String, Extraction>)) {
    let (_dir, paths, table) = image_dir;
    let targets = builder(4).extract_targets(&paths, || Ok(TableExtractor { table: &table }));

    let ids = targets.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(targets[0].filename, "a.png");
}

#[rstest]
fn test_extractor_creation_failure(image_dir: (TempDir, Vec<PathBuf>, HashMap<String, Extraction>)) {
    let (_dir, paths, _table) = image_dir;
    let result = builder(4)
        .build_from_images(&paths, || -> Result<TableExtractor<'static>> { anyhow::bail!("no extractor") });
    let err = result.unwrap_err();
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::NoUsableTargets)));
}

#[rstest]
#[case(DatabaseFormat::Json, "db.json")]
#[case(DatabaseFormat::Bincode, "db.bin")]
fn test_build_save_load(
    image_dir: (TempDir, Vec<PathBuf>, HashMap<String, Extraction>),
    #[case] format: DatabaseFormat,
    #[case] name: &str,
) {
    let (dir, paths, table) = image_dir;
    let db = builder(3).build_from_images(&paths, || Ok(TableExtractor { table: &table })).unwrap();
    assert_eq!(db.metadata.vocabulary_size, 3);
    assert_eq!(db.total_features(), 3);

    let path = dir.path().join(name);
    db.save(&path, format).unwrap();
    let loaded = TargetDatabase::load(&path, format).unwrap();
    assert_eq!(loaded.metadata, db.metadata);
    assert_eq!(loaded.vocabulary.words, db.vocabulary.words);
    for (x, y) in loaded.vocabulary.idf_weights.iter().zip(&db.vocabulary.idf_weights) {
        assert!((x - y).abs() < 1e-12);
    }
    for (x, y) in loaded.targets.iter().zip(&db.targets) {
        assert_eq!((&x.id, &x.bow, &x.descriptors), (&y.id, &y.bow, &y.descriptors));
    }

    let vocabulary = loaded.vocabulary().unwrap();
    assert_eq!(vocabulary.nearest_word(&word(3)), (2, 0));
}

#[rstest]
fn test_target_order_does_not_change_weights() {
    let a = || target("a", &[word(1), word(2), word(2)]);
    let b = || target("b", &[word(2), word(3)]);
    let c = || target("c", &[word(3)]);

    // 词典大小等于描述子数量时不需要聚类，词典只随目标顺序重新排列
    let b6 = builder(6);
    let db1 = b6.build(vec![c(), a(), b()]).unwrap();
    let db2 = b6.build(vec![b(), c(), a()]).unwrap();
    assert_eq!(db1.vocabulary.words.len(), 6);

    let find = |db: &TargetDatabase, id: &str| db.targets.iter().find(|t| t.id == id).unwrap().bow_tfidf.clone();
    for id in ["a", "b", "c"] {
        let (v1, v2) = (find(&db1, id), find(&db2, id));
        let (w1, w2) = (&db1.vocabulary.words, &db2.vocabulary.words);
        // 词 ID 可能不同，比较每个词对应的权重
        let map = |db_words: &Vec<Descriptor>, v: &vocabtree::sparse::WeightVector| {
            let mut pairs = v.iter().map(|(k, w)| (db_words[k as usize], w)).collect::<Vec<_>>();
            pairs.sort_by(|x, y| x.0.cmp(&y.0));
            pairs
        };
        let (p1, p2) = (map(w1, &v1), map(w2, &v2));
        assert_eq!(p1.len(), p2.len());
        for ((d1, x1), (d2, x2)) in p1.iter().zip(&p2) {
            assert_eq!(d1, d2);
            assert!((x1 - x2).abs() < 1e-12);
        }
    }
}
