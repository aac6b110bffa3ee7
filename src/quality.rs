use serde::{Deserialize, Serialize};

use crate::descriptor::KeyPoint;

/// 特征点分布图的网格边长
const LAYOUT_GRID: usize = 8;

/// 提取器给出的图片像素统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    /// 拉普拉斯算子响应的方差，越大越清晰
    pub blur_score: f64,
    /// 灰度标准差 / 128
    pub contrast_score: f64,
    /// 归一化后的色相直方图
    pub hue_histogram: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub blur_score: f64,
    pub distinctiveness: f64,
    /// 每 10000 平方像素的特征点数量
    pub feature_density: f64,
    pub contrast_score: f64,
    pub avg_feature_response: f64,
    pub recommended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorHistogram {
    pub hue_bins: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialLayout {
    /// 8×8 网格中每格的特征点数量，行优先
    pub grid_8x8: Vec<u32>,
    pub uniformity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleHints {
    pub min_scale: f64,
    pub max_scale: f64,
    pub typical_scale: f64,
}

impl Default for ScaleHints {
    fn default() -> Self {
        Self { min_scale: 0.1, max_scale: 2.0, typical_scale: 0.5 }
    }
}

/// 运行时匹配参数的建议值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub min_matches_for_detection: u32,
    pub ransac_threshold: f64,
    pub optical_flow_compatible: bool,
    pub recommended: bool,
}

/// 目标图片的辅助质量信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetQuality {
    pub image_meta: ImageMeta,
    pub quality_metrics: QualityMetrics,
    pub color_histogram: ColorHistogram,
    pub spatial_layout: SpatialLayout,
    pub scale_hints: ScaleHints,
    pub validation: Validation,
}

impl TargetQuality {
    /// 根据像素统计和筛选前的全部特征点评估图片质量
    pub fn assess(stats: &ImageStats, keypoints: &[KeyPoint]) -> Self {
        let (w, h) = (stats.width, stats.height);
        let aspect_ratio = if h == 0 { 0.0 } else { w as f64 / h as f64 };

        let area = w as f64 * h as f64;
        let feature_density =
            if area == 0.0 { 0.0 } else { keypoints.len() as f64 / area * 10000.0 };
        let avg_feature_response = if keypoints.is_empty() {
            0.0
        } else {
            keypoints.iter().map(|k| k.response as f64).sum::<f64>() / keypoints.len() as f64
        };
        let distinctiveness =
            (avg_feature_response * feature_density * stats.contrast_score / 100.0).min(1.0);
        let recommended =
            stats.blur_score > 100.0 && feature_density > 0.5 && stats.contrast_score > 0.3;

        Self {
            image_meta: ImageMeta { width: w, height: h, aspect_ratio },
            quality_metrics: QualityMetrics {
                blur_score: stats.blur_score,
                distinctiveness,
                feature_density,
                contrast_score: stats.contrast_score,
                avg_feature_response,
                recommended,
            },
            color_histogram: ColorHistogram { hue_bins: stats.hue_histogram.clone() },
            spatial_layout: spatial_layout(keypoints, w, h),
            scale_hints: ScaleHints::default(),
            validation: Validation {
                min_matches_for_detection: if recommended { 15 } else { 20 },
                ransac_threshold: 5.0,
                optical_flow_compatible: stats.blur_score > 100.0,
                recommended,
            },
        }
    }
}

fn spatial_layout(keypoints: &[KeyPoint], width: u32, height: u32) -> SpatialLayout {
    let cell_w = width as f32 / LAYOUT_GRID as f32;
    let cell_h = height as f32 / LAYOUT_GRID as f32;
    let mut grid = vec![0u32; LAYOUT_GRID * LAYOUT_GRID];
    for kp in keypoints {
        let gx = ((kp.x / cell_w) as usize).min(LAYOUT_GRID - 1);
        let gy = ((kp.y / cell_h) as usize).min(LAYOUT_GRID - 1);
        grid[gy * LAYOUT_GRID + gx] += 1;
    }

    let n = grid.len() as f64;
    let mean = grid.iter().map(|&c| c as f64).sum::<f64>() / n;
    let var = grid.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / n;
    let uniformity = 1.0 - var.sqrt() / (mean + 1.0);

    SpatialLayout { grid_8x8: grid, uniformity }
}
