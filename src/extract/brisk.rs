use std::path::Path;

use anyhow::{Context, Result, bail};
use opencv::core::{self, Mat, Ptr, Vector};
use opencv::features2d::BRISK;
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};

use super::{Extraction, FeatureExtractor};
use crate::config::BriskOptions;
use crate::descriptor::{DESCRIPTOR_BYTES, Descriptor, Feature, KeyPoint};
use crate::error::BuildError;
use crate::quality::ImageStats;

/// 色相直方图的桶数量，OpenCV 中色相范围为 [0, 180)
const HUE_BINS: i32 = 16;

pub struct BriskExtractor {
    brisk: Ptr<BRISK>,
}

impl BriskExtractor {
    pub fn create(opts: &BriskOptions) -> Result<Self> {
        let brisk = BRISK::create(opts.brisk_thresh, opts.brisk_octaves, opts.brisk_pattern_scale)?;
        Ok(Self { brisk })
    }

    fn detect_and_compute(&mut self, gray: &Mat) -> Result<Vec<Feature>> {
        let mask = Mat::default();
        let mut kps = Vector::<core::KeyPoint>::new();
        let mut des = Mat::default();
        self.brisk.detect_and_compute(gray, &mask, &mut kps, &mut des, false)?;

        if kps.is_empty() || des.empty() {
            return Ok(vec![]);
        }
        if des.cols() as usize != DESCRIPTOR_BYTES {
            return Err(BuildError::DescriptorLength {
                expected: DESCRIPTOR_BYTES,
                actual: des.cols() as usize,
            }
            .into());
        }

        let bytes = des.data_bytes()?;
        let features = kps
            .iter()
            .zip(bytes.chunks_exact(DESCRIPTOR_BYTES))
            .map(|(kp, d)| {
                let mut descriptor: Descriptor = [0; DESCRIPTOR_BYTES];
                descriptor.copy_from_slice(d);
                let pt = kp.pt();
                Feature::new(KeyPoint::new(pt.x, pt.y, kp.response()), descriptor)
            })
            .collect();
        Ok(features)
    }
}

impl FeatureExtractor for BriskExtractor {
    fn extract(&mut self, path: &Path) -> Result<Extraction> {
        let filename = path.to_str().with_context(|| format!("路径不是有效的 UTF-8: {}", path.display()))?;
        let image = imgcodecs::imread(filename, imgcodecs::IMREAD_COLOR)?;
        if image.empty() {
            bail!("无法读取图片: {}", path.display());
        }

        let mut gray = Mat::default();
        imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let features = self.detect_and_compute(&gray)?;
        let stats = image_stats(&image, &gray)?;
        Ok(Extraction { stats, features })
    }
}

fn std_dev(src: &Mat) -> Result<f64> {
    let mut mean = Mat::default();
    let mut stddev = Mat::default();
    core::mean_std_dev_def(src, &mut mean, &mut stddev)?;
    Ok(*stddev.at::<f64>(0)?)
}

fn image_stats(image: &Mat, gray: &Mat) -> Result<ImageStats> {
    let mut laplacian = Mat::default();
    imgproc::laplacian_def(gray, &mut laplacian, core::CV_64F)?;
    let blur_score = std_dev(&laplacian)?.powi(2);
    let contrast_score = std_dev(gray)? / 128.0;

    let mut hsv = Mat::default();
    imgproc::cvt_color_def(image, &mut hsv, imgproc::COLOR_BGR2HSV)?;
    let mut hist = Mat::default();
    imgproc::calc_hist_def(
        &Vector::<Mat>::from_iter([hsv]),
        &Vector::<i32>::from_slice(&[0]),
        &Mat::default(),
        &mut hist,
        &Vector::<i32>::from_slice(&[HUE_BINS]),
        &Vector::<f32>::from_slice(&[0., 180.]),
    )?;
    let bins = hist.data_typed::<f32>()?;
    let total: f32 = bins.iter().sum();
    let hue_histogram =
        bins.iter().map(|&b| if total > 0.0 { b / total } else { 0.0 }).collect();

    Ok(ImageStats {
        width: gray.cols() as u32,
        height: gray.rows() as u32,
        blur_score,
        contrast_score,
        hue_histogram,
    })
}
