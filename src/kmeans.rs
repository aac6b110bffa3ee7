use kmeans::{EuclideanDistance, KMeans, KMeansConfig, KMeansState};
use log::info;
use rand08::SeedableRng;
use rand08::rngs::StdRng;

/// 二进制向量展开为实数向量，每一位变成一个 0.0 / 1.0 的坐标
///
/// 位序为每个字节从高位到低位，与 numpy 的 unpackbits 一致。
pub fn binary_to_real(x_in: &[u8]) -> Vec<f32> {
    let d = x_in.len() * 8;
    let mut v = vec![0.0; d];
    for i in 0..d {
        let bit_value = (x_in[i >> 3] >> (7 - (i & 7))) & 1;
        v[i] = bit_value as f32;
    }
    v
}

/// 实数向量以 0.5 为阈值重新二值化，并打包回字节
pub fn real_to_binary(x_in: &[f32]) -> Vec<u8> {
    assert!(x_in.len() % 8 == 0, "d must be a multiple of 8");
    x_in.chunks_exact(8)
        .map(|bits| {
            bits.iter().enumerate().fold(0u8, |b, (j, &v)| if v > 0.5 { b | (0x80 >> j) } else { b })
        })
        .collect()
}

pub fn imbalance_factor(hist: &[usize]) -> f32 {
    let (mut tot, mut uf) = (0.0, 0.0);
    for h in hist {
        let h = *h as f32;
        tot += h;
        uf += h.powf(2.0);
    }
    if tot == 0.0 {
        return 0.0;
    }
    uf * hist.len() as f32 / tot.powf(2.0)
}

/// mini-batch kmeans 参数
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    /// 最大迭代次数
    pub max_iter: usize,
    /// 每个批次的向量数量
    pub batch_size: usize,
    /// 随机数种子，固定后结果可复现
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { max_iter: 100, batch_size: 1000, seed: 42 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BinaryKMeansResult<const N: usize> {
    /// 二值化后的聚类中心
    pub centroids: Vec<[u8; N]>,
    /// 每个聚类中心包含的向量数量
    pub centroid_frequency: Vec<usize>,
    /// 实数空间中的距离和
    pub distsum: f32,
}

/// 在二进制向量的实数松弛上做 mini-batch kmeans，再把中心点二值化
///
/// 二进制向量在位空间里无法求平均，所以先展开为 0/1 坐标聚类，结束后以 0.5 为阈值取回合法的位模式。
///
/// 参数：
/// - x: 输入向量
/// - nc: 聚类中心数量，必须满足 0 < nc <= x.len()
/// - params: 迭代次数、批大小、随机种子
/// - verbose: 是否打印每轮迭代信息
pub fn binary_kmeans<const N: usize>(
    x: &[[u8; N]],
    nc: usize,
    params: &KMeansParams,
    verbose: bool,
) -> BinaryKMeansResult<N> {
    let n = x.len();
    assert!(nc > 0 && nc <= n, "nc must be in (0, {n}]");

    // 每个向量自成一类，不需要迭代
    if nc == n {
        return BinaryKMeansResult { centroids: x.to_vec(), centroid_frequency: vec![1; n], distsum: 0.0 };
    }

    let data = binary_to_real(x.as_flattened());
    let km: KMeans<_, 16, _> = KMeans::new(&data, n, N * 8, EuclideanDistance);
    let rng = StdRng::seed_from_u64(params.seed);
    let conf = if verbose {
        KMeansConfig::build()
            .random_generator(rng)
            .init_done(&|_s: &KMeansState<f32>| info!("KMeans 初始化完成"))
            .iteration_done(&|s: &KMeansState<f32>, nr: usize, new_distsum: f32| {
                info!(
                    "第 {} 轮 - 不平衡度：{:.2} | 距离和变化：{:+.2}",
                    nr,
                    imbalance_factor(&s.centroid_frequency),
                    new_distsum - s.distsum
                );
            })
            .build()
    } else {
        KMeansConfig::build().random_generator(rng).build()
    };

    // 批次起点在 [0, n - batch_size) 中随机选取，批大小必须小于 n
    let batch_size = params.batch_size.clamp(1, n - 1);
    let state = km.kmeans_minibatch(batch_size, nc, params.max_iter, KMeans::init_random_sample, &conf);

    let centroids = real_to_binary(&state.centroids.to_vec())
        .chunks_exact(N)
        .map(|c| {
            let mut word = [0u8; N];
            word.copy_from_slice(c);
            word
        })
        .collect::<Vec<_>>();
    assert_eq!(centroids.len(), nc);

    BinaryKMeansResult {
        centroids,
        centroid_frequency: state.centroid_frequency.clone(),
        distsum: state.distsum,
    }
}
