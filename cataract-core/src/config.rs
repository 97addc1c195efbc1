//! Configuration for cataract-core
//!
//! Every numeric constant the pipeline depends on lives here. The defaults
//! reproduce the reference behaviour on a 500x500 canonical frame.

use crate::circles::CircleSelection;
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Geometry normalisation and noise suppression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Canonical (width, height) every input is resized to
    pub canonical_size: (u32, u32),
    /// Median blur aperture applied to the grayscale buffer
    pub blur_kernel: u32,
    /// Minimum distance between detected circle centers. Tied to the
    /// canonical size, not recomputed from it.
    pub search_radius: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            canonical_size: (500, 500),
            blur_kernel: 5,
            search_radius: 300.0,
        }
    }
}

/// Cascade eye detector parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Explicit cascade XML. When unset the managed copy in `model_path` is used.
    pub cascade_path: Option<PathBuf>,
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub min_region_size: (u32, u32),
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            cascade_path: None,
            scale_factor: 1.1,
            min_neighbors: 5,
            min_region_size: (30, 30),
        }
    }
}

/// Gradient Hough circle transform parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleConfig {
    /// Inverse accumulator resolution (1 = same as the image)
    pub accumulator_ratio: f64,
    /// Upper Canny threshold used for edge extraction
    pub edge_threshold: f64,
    /// Accumulator votes a center needs to be reported
    pub vote_threshold: f64,
    /// 0 leaves the lower bound open
    pub min_radius: u32,
    /// 0 leaves the upper bound open
    pub max_radius: u32,
    pub selection: CircleSelection,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            accumulator_ratio: 1.0,
            edge_threshold: 50.0,
            vote_threshold: 30.0,
            min_radius: 0,
            max_radius: 0,
            selection: CircleSelection::First,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Mean intensities at or below this value are not cataract
    pub cataract_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cataract_threshold: 120.0,
        }
    }
}

/// Overlay appearance. Colours are BGR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub text_origin: (i32, i32),
    pub font_scale: f64,
    pub text_thickness: i32,
    pub text_color: (u8, u8, u8),
    pub outline_color: (u8, u8, u8),
    pub outline_thickness: i32,
    pub center_color: (u8, u8, u8),
    pub center_radius: i32,
    pub center_thickness: i32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            text_origin: (10, 50),
            font_scale: 2.0,
            text_thickness: 4,
            text_color: (255, 255, 255),
            outline_color: (0, 255, 0),
            outline_thickness: 2,
            center_color: (0, 0, 255),
            center_radius: 2,
            center_thickness: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report "No circles detected." instead of folding the no-circle
    /// outcome into "No Eyes Detected".
    pub distinct_no_circle_message: bool,
}

/// Complete scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory holding downloaded cascade files
    pub model_path: PathBuf,
    pub preprocess: PreprocessConfig,
    pub region: RegionConfig,
    pub circles: CircleConfig,
    pub scoring: ScoringConfig,
    pub annotation: AnnotationConfig,
    pub report: ReportConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let model_path = dirs::home_dir()
            .map(|mut p| {
                p.push(".cataract");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models"));

        Self {
            model_path,
            preprocess: PreprocessConfig::default(),
            region: RegionConfig::default(),
            circles: CircleConfig::default(),
            scoring: ScoringConfig::default(),
            annotation: AnnotationConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration from a JSON or TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration, trying JSON first and TOML second
    pub fn from_str(content: &str) -> Result<Self, ScanError> {
        if let Ok(config) = serde_json::from_str::<ScanConfig>(content) {
            return Ok(config);
        }

        toml::from_str::<ScanConfig>(content)
            .map_err(|e| ScanError::Config(format!("Unrecognised configuration format: {}", e)))
    }

    /// Apply `CATARACT_CASCADE_PATH` and `CATARACT_MODEL_DIR` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("CATARACT_CASCADE_PATH") {
            if !path.is_empty() {
                self.region.cascade_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(dir) = std::env::var("CATARACT_MODEL_DIR") {
            if !dir.is_empty() {
                self.model_path = PathBuf::from(dir);
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let (width, height) = self.preprocess.canonical_size;
        if width == 0 || height == 0 {
            return Err("Canonical size must be non-zero".to_string());
        }
        if width > 8192 || height > 8192 {
            return Err("Canonical size too large (max 8192)".to_string());
        }

        let kernel = self.preprocess.blur_kernel;
        if kernel < 3 || kernel % 2 == 0 {
            return Err("Blur kernel must be odd and at least 3".to_string());
        }

        if !self.preprocess.search_radius.is_finite() || self.preprocess.search_radius <= 0.0 {
            return Err("Search radius must be positive".to_string());
        }

        if !self.region.scale_factor.is_finite() || self.region.scale_factor <= 1.0 {
            return Err("Scale factor must be greater than 1".to_string());
        }

        let circles = &self.circles;
        if !circles.accumulator_ratio.is_finite() || circles.accumulator_ratio <= 0.0 {
            return Err("Accumulator ratio must be positive".to_string());
        }
        if circles.edge_threshold <= 0.0 || circles.vote_threshold <= 0.0 {
            return Err("Edge and vote thresholds must be positive".to_string());
        }
        if circles.min_radius > 0 && circles.max_radius > 0 && circles.max_radius < circles.min_radius {
            return Err("Maximum radius is smaller than minimum radius".to_string());
        }

        let threshold = self.scoring.cataract_threshold;
        if !threshold.is_finite() || !(0.0..=255.0).contains(&threshold) {
            return Err("Cataract threshold must lie within 0..=255".to_string());
        }

        if self.annotation.font_scale <= 0.0 {
            return Err("Font scale must be positive".to_string());
        }

        Ok(())
    }

    /// Cascade file the region detector should load
    pub fn resolve_cascade_path(&self) -> PathBuf {
        self.region
            .cascade_path
            .clone()
            .unwrap_or_else(|| self.model_path.join(crate::cascade::EYE_CASCADE_FILE))
    }
}
