use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::descriptor::WordId;
use crate::error::BuildError;

/// 以词 ID 为键的稀疏向量
///
/// 不存在的键视为 0。键按升序排列，所以序列化结果与插入顺序无关。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector<T> {
    entries: BTreeMap<WordId, T>,
}

pub type Histogram = SparseVector<u32>;
pub type WeightVector = SparseVector<f64>;

impl<T> Default for SparseVector<T> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<T: Copy + Default> SparseVector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取值，不存在时返回 0
    pub fn get(&self, word: WordId) -> T {
        self.entries.get(&word).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, word: WordId, value: T) -> Option<T> {
        self.entries.insert(word, value)
    }

    pub fn contains(&self, word: WordId) -> bool {
        self.entries.contains_key(&word)
    }

    /// 非零项数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WordId, T)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = WordId> + '_ {
        self.entries.keys().copied()
    }

    /// 检查所有键都在 [0, size) 内
    pub fn check_range(&self, size: usize) -> Result<(), BuildError> {
        match self.entries.last_key_value() {
            Some((&word, _)) if word as usize >= size => Err(BuildError::WordOutOfRange { word, size }),
            _ => Ok(()),
        }
    }
}

impl<T: Copy + Default + AddAssign> SparseVector<T> {
    /// 在 word 上累加 value
    pub fn add(&mut self, word: WordId, value: T) {
        match self.entries.entry(word) {
            Entry::Occupied(mut e) => *e.get_mut() += value,
            Entry::Vacant(e) => {
                e.insert(value);
            }
        }
    }
}

impl<T> FromIterator<(WordId, T)> for SparseVector<T> {
    fn from_iter<I: IntoIterator<Item = (WordId, T)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl Histogram {
    /// 所有词的出现次数之和
    pub fn total(&self) -> u64 {
        self.entries.values().map(|&c| c as u64).sum()
    }
}
