//! Intensity heuristic and verdict overlay
//!
//! The score is the mean intensity of the pixels OUTSIDE the selected
//! circle. Whether the lens interior was intended instead is unresolved, so
//! the mask direction must not be flipped here.

use crate::circles::{bgr, Circle};
use crate::config::{AnnotationConfig, ReportConfig, ScoringConfig};
use crate::error::ScanError;
use opencv::core::{Mat, Point, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub const NO_EYES_MESSAGE: &str = "No Eyes Detected";
pub const NO_CIRCLES_MESSAGE: &str = "No circles detected.";
pub const NOT_CATARACT_MESSAGE: &str = "Not Cataract";

/// Terminal outcome of one scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    NoEyeDetected,
    NoCircleDetected,
    NotCataract,
    Cataract { severity_percent: f64 },
}

impl Verdict {
    /// Text handed back to callers.
    ///
    /// The no-circle outcome folds into the no-eye message unless the report
    /// configuration asks for it to be kept apart.
    pub fn message(&self, report: &ReportConfig) -> String {
        match self {
            Verdict::NoCircleDetected if !report.distinct_no_circle_message => NO_EYES_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn severity_percent(&self) -> Option<f64> {
        match self {
            Verdict::Cataract { severity_percent } => Some(*severity_percent),
            _ => None,
        }
    }

    pub fn is_cataract(&self) -> bool {
        matches!(self, Verdict::Cataract { .. })
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoEyeDetected => f.write_str(NO_EYES_MESSAGE),
            Verdict::NoCircleDetected => f.write_str(NO_CIRCLES_MESSAGE),
            Verdict::NotCataract => f.write_str(NOT_CATARACT_MESSAGE),
            Verdict::Cataract { severity_percent } => write!(f, "Cataract, {:.2}%", severity_percent),
        }
    }
}

/// Mean intensity of pixels strictly outside `circle`.
///
/// `None` when the circle covers the whole frame.
pub fn outside_mean(gray: &Mat, circle: &Circle) -> Result<Option<f64>, ScanError> {
    if gray.typ() != CV_8UC1 {
        return Err(ScanError::Processing(format!(
            "Scoring needs an 8-bit single channel buffer, got type {}",
            gray.typ()
        )));
    }

    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for y in 0..gray.rows() {
        let row = gray.at_row::<u8>(y)?;
        for (x, &value) in row.iter().enumerate() {
            // Row length is bounded by Mat::cols, an i32
            if !circle.contains(x as i32, y) {
                sum += u64::from(value);
                count += 1;
            }
        }
    }

    if count == 0 {
        return Ok(None);
    }
    Ok(Some(sum as f64 / count as f64))
}

pub struct CataractScorer {
    config: ScoringConfig,
}

impl CataractScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Decide NotCataract / Cataract from the outside-circle mean
    pub fn evaluate(&self, gray: &Mat, circle: &Circle) -> Result<Verdict, ScanError> {
        let Some(mean) = outside_mean(gray, circle)? else {
            warn!("Circle {:?} covers the whole frame, nothing to score", circle);
            return Ok(Verdict::NotCataract);
        };

        debug!("Mean intensity outside circle {:?}: {:.3}", circle, mean);
        Ok(self.classify(mean))
    }

    /// Threshold is inclusive: a mean equal to it is not cataract
    pub fn classify(&self, mean_intensity: f64) -> Verdict {
        if mean_intensity <= self.config.cataract_threshold {
            Verdict::NotCataract
        } else {
            Verdict::Cataract {
                severity_percent: (mean_intensity / 255.0) * 100.0,
            }
        }
    }
}

/// Render verdict text onto the color buffer
pub fn annotate_verdict(color: &mut Mat, text: &str, style: &AnnotationConfig) -> Result<(), ScanError> {
    let (x, y) = style.text_origin;
    imgproc::put_text(
        color,
        text,
        Point::new(x, y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        style.font_scale,
        bgr(style.text_color),
        style.text_thickness,
        imgproc::LINE_AA,
        false,
    )?;
    Ok(())
}
