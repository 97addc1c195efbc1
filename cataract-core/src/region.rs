//! Eye region detection
//!
//! Regions only gate the pipeline: at least one must be found before the
//! circle search runs. Their geometry is reported but never used for scoring.

use crate::config::RegionConfig;
use crate::error::ScanError;
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Axis-aligned eye candidate in canonical image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Anything that can find eye-shaped regions in a grayscale frame
pub trait RegionDetector: Send + Sync {
    fn detect(&self, gray: &Mat) -> Result<Vec<Region>, ScanError>;
}

/// Pretrained Haar cascade run at multiple scales
pub struct CascadeEyeDetector {
    // detect_multi_scale needs &mut, the detector itself is shared
    classifier: Mutex<CascadeClassifier>,
    scale_factor: f64,
    min_neighbors: i32,
    min_size: Size,
}

impl CascadeEyeDetector {
    /// Load the cascade XML at `path`
    pub fn new(path: &Path, config: &RegionConfig) -> Result<Self, ScanError> {
        if !path.exists() {
            return Err(ScanError::Model(format!(
                "Cascade file not found at {:?} (run `cataract fetch-cascade` or set region.cascade_path)",
                path
            )));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| ScanError::Model(format!("Cascade path {:?} is not valid UTF-8", path)))?;

        let classifier = CascadeClassifier::new(path_str)?;
        if classifier.empty()? {
            return Err(ScanError::Model(format!("Failed to load cascade from {:?}", path)));
        }

        let min_neighbors = i32::try_from(config.min_neighbors)
            .map_err(|_| ScanError::Config("min_neighbors out of range".to_string()))?;
        let (min_w, min_h) = config.min_region_size;
        let min_size = Size::new(
            i32::try_from(min_w).map_err(|_| ScanError::Config("min_region_size out of range".to_string()))?,
            i32::try_from(min_h).map_err(|_| ScanError::Config("min_region_size out of range".to_string()))?,
        );

        info!("Eye cascade loaded from {:?}", path);

        Ok(Self {
            classifier: Mutex::new(classifier),
            scale_factor: config.scale_factor,
            min_neighbors,
            min_size,
        })
    }
}

impl RegionDetector for CascadeEyeDetector {
    fn detect(&self, gray: &Mat) -> Result<Vec<Region>, ScanError> {
        let mut rects = Vector::<Rect>::new();
        self.classifier.lock().detect_multi_scale(
            gray,
            &mut rects,
            self.scale_factor,
            self.min_neighbors,
            0,
            self.min_size,
            Size::default(),
        )?;

        let regions: Vec<Region> = rects.iter().map(Region::from).collect();
        debug!("Cascade found {} eye regions", regions.len());
        Ok(regions)
    }
}
