//! Source image loading

use crate::error::ScanError;
use opencv::core::{Mat, CV_8UC1, CV_8UC3};
use opencv::imgcodecs;
use opencv::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// A source photograph in the two representations the pipeline carries
pub struct EyeImage {
    /// 3-channel BGR buffer used for drawing and output
    pub color: Mat,
    /// Single-channel intensity buffer used for detection and scoring
    pub gray: Mat,
}

impl EyeImage {
    /// Build from already decoded buffers, checking that they agree
    pub fn from_buffers(color: Mat, gray: Mat) -> Result<Self, ScanError> {
        if color.typ() != CV_8UC3 {
            return Err(ScanError::Processing(format!(
                "Color buffer must be 8-bit BGR, got type {}",
                color.typ()
            )));
        }
        if gray.typ() != CV_8UC1 {
            return Err(ScanError::Processing(format!(
                "Gray buffer must be 8-bit single channel, got type {}",
                gray.typ()
            )));
        }
        if color.rows() != gray.rows() || color.cols() != gray.cols() {
            return Err(ScanError::Processing(format!(
                "Buffer size mismatch: color {}x{}, gray {}x{}",
                color.cols(),
                color.rows(),
                gray.cols(),
                gray.rows()
            )));
        }
        Ok(Self { color, gray })
    }

    pub fn width(&self) -> i32 {
        self.color.cols()
    }

    pub fn height(&self) -> i32 {
        self.color.rows()
    }
}

/// Decode `path` as color and as grayscale.
///
/// Returns `Ok(None)` when the file cannot be decoded; the caller reports
/// that as "no eye" instead of failing.
pub fn load_image(path: &Path) -> Result<Option<EyeImage>, ScanError> {
    let Some(path_str) = path.to_str() else {
        warn!("Source path {:?} is not valid UTF-8, treating as unreadable", path);
        return Ok(None);
    };

    let color = match imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR) {
        Ok(mat) => mat,
        Err(e) => {
            warn!("Failed to decode {:?} as color: {}", path, e);
            return Ok(None);
        }
    };
    let gray = match imgcodecs::imread(path_str, imgcodecs::IMREAD_GRAYSCALE) {
        Ok(mat) => mat,
        Err(e) => {
            warn!("Failed to decode {:?} as grayscale: {}", path, e);
            return Ok(None);
        }
    };

    if color.empty() || gray.empty() {
        warn!("Source {:?} is not a decodable image", path);
        return Ok(None);
    }

    let image = EyeImage::from_buffers(color, gray)?;
    debug!("Loaded {:?} at {}x{}", path, image.width(), image.height());
    Ok(Some(image))
}
