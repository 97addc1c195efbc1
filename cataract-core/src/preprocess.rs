//! Geometry normalisation and noise suppression

use crate::config::PreprocessConfig;
use crate::error::ScanError;
use crate::loader::EyeImage;
use opencv::core::{Mat, Scalar, Size, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use tracing::debug;

/// Buffers at canonical resolution plus the circle search radius
pub struct Preprocessed {
    /// Resized only, so the annotated output stays faithful to the source
    pub color: Mat,
    /// Resized and median blurred
    pub gray: Mat,
    pub search_radius: f64,
}

impl Preprocessed {
    pub fn size(&self) -> (i32, i32) {
        (self.color.cols(), self.color.rows())
    }
}

fn canonical_size(config: &PreprocessConfig) -> Result<Size, ScanError> {
    let (width, height) = config.canonical_size;
    let width = i32::try_from(width)
        .map_err(|_| ScanError::Config(format!("Canonical width {} out of range", width)))?;
    let height = i32::try_from(height)
        .map_err(|_| ScanError::Config(format!("Canonical height {} out of range", height)))?;
    Ok(Size::new(width, height))
}

/// Resize both buffers with cubic interpolation and blur the grayscale one
pub fn preprocess(image: &EyeImage, config: &PreprocessConfig) -> Result<Preprocessed, ScanError> {
    let size = canonical_size(config)?;

    let mut color = Mat::default();
    imgproc::resize(&image.color, &mut color, size, 0.0, 0.0, imgproc::INTER_CUBIC)?;

    let mut resized_gray = Mat::default();
    imgproc::resize(&image.gray, &mut resized_gray, size, 0.0, 0.0, imgproc::INTER_CUBIC)?;

    let kernel = i32::try_from(config.blur_kernel)
        .map_err(|_| ScanError::Config(format!("Blur kernel {} out of range", config.blur_kernel)))?;
    let mut gray = Mat::default();
    imgproc::median_blur(&resized_gray, &mut gray, kernel)?;

    debug!(
        "Preprocessed {}x{} -> {}x{} (median {})",
        image.width(),
        image.height(),
        size.width,
        size.height,
        kernel
    );

    Ok(Preprocessed {
        color,
        gray,
        search_radius: config.search_radius,
    })
}

/// Black color frame at canonical size, written when the source is unreadable
pub fn blank_canvas(config: &PreprocessConfig) -> Result<Mat, ScanError> {
    let size = canonical_size(config)?;
    Ok(Mat::new_rows_cols_with_default(size.height, size.width, CV_8UC3, Scalar::all(0.0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{CV_8UC1, Vec3b};

    fn image(width: i32, height: i32, value: f64) -> EyeImage {
        let color = Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(value)).unwrap();
        let gray = Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(value)).unwrap();
        EyeImage::from_buffers(color, gray).unwrap()
    }

    #[test]
    fn test_preprocess_resizes_to_canonical() {
        let out = preprocess(&image(640, 480, 90.0), &PreprocessConfig::default()).unwrap();
        assert_eq!(out.size(), (500, 500));
        assert_eq!((out.gray.cols(), out.gray.rows()), (500, 500));
        assert_eq!(out.search_radius, 300.0);
    }

    #[test]
    fn test_preprocess_upscales_small_input() {
        let out = preprocess(&image(32, 20, 90.0), &PreprocessConfig::default()).unwrap();
        assert_eq!(out.size(), (500, 500));
    }

    #[test]
    fn test_preprocess_uniform_stays_uniform() {
        let out = preprocess(&image(300, 200, 77.0), &PreprocessConfig::default()).unwrap();
        assert_eq!(*out.gray.at_2d::<u8>(250, 250).unwrap(), 77);
        assert_eq!(*out.gray.at_2d::<u8>(0, 499).unwrap(), 77);
        assert_eq!(*out.color.at_2d::<Vec3b>(499, 0).unwrap(), Vec3b::from([77, 77, 77]));
    }

    #[test]
    fn test_median_blur_only_touches_gray() {
        // A single bright pixel survives in color but is removed by the median
        let mut src = image(500, 500, 0.0);
        *src.gray.at_2d_mut::<u8>(100, 100).unwrap() = 255;
        *src.color.at_2d_mut::<Vec3b>(100, 100).unwrap() = Vec3b::from([255, 255, 255]);

        let out = preprocess(&src, &PreprocessConfig::default()).unwrap();
        assert_eq!(*out.gray.at_2d::<u8>(100, 100).unwrap(), 0);
        assert_eq!(*out.color.at_2d::<Vec3b>(100, 100).unwrap(), Vec3b::from([255, 255, 255]));
    }

    #[test]
    fn test_blank_canvas() {
        let canvas = blank_canvas(&PreprocessConfig::default()).unwrap();
        assert_eq!((canvas.cols(), canvas.rows()), (500, 500));
        assert_eq!(canvas.typ(), CV_8UC3);
    }
}
