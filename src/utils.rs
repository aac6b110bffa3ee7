use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indicatif::ProgressStyle;
use log::info;
use regex::Regex;
use walkdir::WalkDir;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// 由逗号分隔的后缀列表生成不区分大小写的正则
pub fn suffix_regex(suffix: &str) -> Result<Regex, regex::Error> {
    let alts = suffix.split(',').map(|s| regex::escape(s.trim())).collect::<Vec<_>>().join("|");
    Regex::new(&format!("(?i)^({alts})$"))
}

/// 扫描目录下的图片文件，按路径排序以保证目标顺序稳定
pub fn scan_images(dir: &Path, re_suf: &Regex, recursive: bool) -> Vec<PathBuf> {
    info!("开始扫描目录: {}", dir.display());
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut entries = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                return None;
            }
            let ext = path.extension()?;
            re_suf.is_match(&ext.to_string_lossy()).then(|| path.to_path_buf())
        })
        .collect::<Vec<_>>();
    entries.sort();
    info!("扫描完成，共 {} 张图片", entries.len());
    entries
}

/// 为目标分配唯一 ID：默认使用文件名（不含扩展名），重复时追加序号
#[derive(Debug, Default)]
pub struct TargetIds {
    used: HashSet<String>,
}

impl TargetIds {
    pub fn assign(&mut self, path: &Path) -> String {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let mut id = stem.clone();
        let mut n = 2;
        while !self.used.insert(id.clone()) {
            id = format!("{stem}_{n}");
            n += 1;
        }
        id
    }
}
