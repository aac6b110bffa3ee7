use bytemuck::pod_read_unaligned;

/// 计算两个 N 字节二进制向量的汉明距离
#[inline(always)]
pub fn hamming<const N: usize>(va: &[u8; N], vb: &[u8; N]) -> u32 {
    if N % 8 == 0 { hamming_u64(va, vb) } else { hamming_naive(va, vb) }
}

#[inline(always)]
pub fn hamming_naive(va: &[u8], vb: &[u8]) -> u32 {
    va.iter().zip(vb).map(|(a, b)| (a ^ b).count_ones()).sum()
}

/// 按 64 位分组计算，要求长度为 8 的倍数
#[inline(always)]
pub fn hamming_u64(va: &[u8], vb: &[u8]) -> u32 {
    // 描述子通常没有 8 字节对齐，所以不能直接 cast_slice
    va.chunks_exact(8)
        .zip(vb.chunks_exact(8))
        .map(|(a, b)| (pod_read_unaligned::<u64>(a) ^ pod_read_unaligned::<u64>(b)).count_ones())
        .sum()
}

/// 在 centroids 中线性扫描距离 x 最近的向量，返回其下标和距离
///
/// 距离相同时取下标最小者，保证结果可复现。centroids 为空时返回 None。
pub fn nearest<const N: usize>(x: &[u8; N], centroids: &[[u8; N]]) -> Option<(usize, u32)> {
    let mut best: Option<(usize, u32)> = None;
    for (i, c) in centroids.iter().enumerate() {
        let d = hamming::<N>(x, c);
        // 严格小于，保留先出现的下标
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
            if d == 0 {
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_identical() {
        let va = [0u8; 64];
        let vb = [0u8; 64];
        assert_eq!(hamming::<64>(&va, &vb), 0);
    }

    #[test]
    fn test_hamming_all_different() {
        let va = [0u8; 64];
        let vb = [255u8; 64];
        assert_eq!(hamming::<64>(&va, &vb), 512);
    }

    #[test]
    fn test_hamming_single_bit() {
        let va = [0u8; 1];
        let vb = [0b0001_0000u8; 1];
        assert_eq!(hamming::<1>(&va, &vb), 1);
    }

    #[test]
    fn test_hamming_u64_matches_naive() {
        let va: Vec<u8> = (0..64).map(|i| (i * 37 % 251) as u8).collect();
        let vb: Vec<u8> = (0..64).map(|i| (i * 91 % 241) as u8).collect();
        assert_eq!(hamming_u64(&va, &vb), hamming_naive(&va, &vb));
    }

    #[test]
    fn test_nearest_basic() {
        let x = [0u8; 4];
        let centroids = [[0xFF; 4], [0x01, 0, 0, 0], [0x03, 0, 0, 0]];
        assert_eq!(nearest(&x, &centroids), Some((1, 1)));
    }

    #[test]
    fn test_nearest_tie_breaks_to_lowest_id() {
        let x = [0u8; 4];
        let centroids = [[0xFF; 4], [0x02, 0, 0, 0], [0x01, 0, 0, 0]];
        assert_eq!(nearest(&x, &centroids), Some((1, 1)));
    }

    #[test]
    fn test_nearest_empty() {
        let x = [0u8; 4];
        assert_eq!(nearest::<4>(&x, &[]), None);
    }
}
