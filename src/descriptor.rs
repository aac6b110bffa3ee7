use serde::{Deserialize, Serialize};

/// BRISK 描述子的字节数
pub const DESCRIPTOR_BYTES: usize = 64;

/// 512 位二进制描述子
pub type Descriptor = [u8; DESCRIPTOR_BYTES];

/// 视觉词 ID，即词典中的下标
pub type WordId = u32;

/// 特征点位置与响应强度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    pub response: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32, response: f32) -> Self {
        Self { x, y, response }
    }
}

/// 一个特征点及其描述子，提取后不再修改
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feature<const N: usize = DESCRIPTOR_BYTES> {
    pub keypoint: KeyPoint,
    pub descriptor: [u8; N],
}

impl<const N: usize> Feature<N> {
    pub fn new(keypoint: KeyPoint, descriptor: [u8; N]) -> Self {
        Self { keypoint, descriptor }
    }
}

/// serde 只为长度不超过 32 的数组实现了序列化，这里把描述子当作字节序列处理
pub mod serde_descriptors {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(v: &[[u8; N]], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(v.iter().map(|d| d.as_slice()))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<Vec<[u8; N]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Vec<u8>>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|d| {
                let len = d.len();
                <[u8; N]>::try_from(d)
                    .map_err(|_| D::Error::custom(format!("描述子长度应为 {N} 字节，实际为 {len}")))
            })
            .collect()
    }
}
