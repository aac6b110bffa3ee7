use log::debug;

use crate::descriptor::Feature;

/// 每张目标图片的特征点预算
///
/// 单纯按响应强度取前 K 个，特征点会扎堆在纹理丰富的区域，遮挡或视角变化时容易全部丢失。
/// 这里把图片划分为 grid_size × grid_size 的网格，先按配额在各格子中取强特征点，
/// 再用剩余的最强特征点补齐预算。
#[derive(Debug, Clone, Copy)]
pub struct FeatureBudget {
    /// 每张图片最多保留的特征点数量
    max_features: usize,
    /// 网格边长，至少为 1
    grid_size: usize,
}

impl Default for FeatureBudget {
    fn default() -> Self {
        Self { max_features: 500, grid_size: 4 }
    }
}

impl FeatureBudget {
    pub fn new(max_features: usize, grid_size: usize) -> Self {
        Self { max_features, grid_size: grid_size.max(1) }
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// 每个格子的配额
    pub fn cell_quota(&self) -> usize {
        self.max_features / (self.grid_size * self.grid_size)
    }

    /// 返回特征点 (x, y) 所在格子的序号（行优先）
    fn cell_of(&self, x: f32, y: f32, cell_w: f32, cell_h: f32) -> usize {
        // NaN 和负数在 as 转换时会变成 0，除以 0 得到的 inf 会饱和到 usize::MAX
        let cx = ((x / cell_w) as usize).min(self.grid_size - 1);
        let cy = ((y / cell_h) as usize).min(self.grid_size - 1);
        cy * self.grid_size + cx
    }

    /// 从一张 width × height 的图片的全部特征点中选出至多 max_features 个
    ///
    /// 输出顺序即入选顺序：先是第一轮按格子配额入选的，然后是第二轮补齐的。
    pub fn select<const N: usize>(
        &self,
        features: Vec<Feature<N>>,
        width: u32,
        height: u32,
    ) -> Vec<Feature<N>> {
        let budget = self.max_features;
        if features.len() <= budget {
            return features;
        }

        // 稳定排序，响应相同的特征点保持原始顺序
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by(|&a, &b| {
            features[b].keypoint.response.total_cmp(&features[a].keypoint.response)
        });

        let cell_w = width as f32 / self.grid_size as f32;
        let cell_h = height as f32 / self.grid_size as f32;
        let quota = self.cell_quota();

        let mut selected = Vec::with_capacity(budget);
        let mut taken = vec![false; features.len()];
        let mut cell_counts = vec![0usize; self.grid_size * self.grid_size];

        for &idx in &order {
            if selected.len() >= budget {
                break;
            }
            let kp = &features[idx].keypoint;
            let cell = self.cell_of(kp.x, kp.y, cell_w, cell_h);
            if cell_counts[cell] < quota {
                cell_counts[cell] += 1;
                taken[idx] = true;
                selected.push(idx);
            }
        }
        let first_pass = selected.len();

        for &idx in &order {
            if selected.len() >= budget {
                break;
            }
            if !taken[idx] {
                taken[idx] = true;
                selected.push(idx);
            }
        }

        debug!(
            "特征点筛选：{} -> {}（网格入选 {}，补齐 {}）",
            features.len(),
            selected.len(),
            first_pass,
            selected.len() - first_pass
        );

        selected.into_iter().map(|idx| features[idx]).collect()
    }
}
