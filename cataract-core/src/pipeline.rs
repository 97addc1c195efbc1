//! Scan orchestration
//!
//! Load, preprocess, gate on eye regions, locate circles, score. Every
//! terminal state writes the color buffer to the output path with whatever
//! annotations were applied up to that point.

use crate::circles::{draw_circles, Circle, CircleLocator, HoughCircleLocator};
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::loader::load_image;
use crate::preprocess::{blank_canvas, preprocess};
use crate::region::{CascadeEyeDetector, RegionDetector};
use crate::scoring::{annotate_verdict, CataractScorer, Verdict};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything one scan produced
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub verdict: Verdict,
    /// Caller-facing text, see [`Verdict::message`]
    pub message: String,
    pub output_path: PathBuf,
    pub regions: usize,
    pub circles: Vec<Circle>,
    pub selected: Option<Circle>,
}

/// Single-image cataract detector with pluggable detection backends
pub struct CataractDetector {
    config: ScanConfig,
    regions: Box<dyn RegionDetector>,
    circles: Box<dyn CircleLocator>,
    scorer: CataractScorer,
}

impl CataractDetector {
    /// Detector backed by the Haar eye cascade and the Hough transform
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate().map_err(ScanError::Config)?;
        let cascade_path = config.resolve_cascade_path();
        let regions = CascadeEyeDetector::new(&cascade_path, &config.region)?;
        let circles = HoughCircleLocator::new(config.circles.clone());
        Self::with_backends(config, Box::new(regions), Box::new(circles))
    }

    /// Detector with caller-supplied region and circle backends
    pub fn with_backends(
        config: ScanConfig,
        regions: Box<dyn RegionDetector>,
        circles: Box<dyn CircleLocator>,
    ) -> Result<Self, ScanError> {
        config.validate().map_err(ScanError::Config)?;
        let scorer = CataractScorer::new(config.scoring.clone());
        Ok(Self {
            config,
            regions,
            circles,
            scorer,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the full pipeline on `source`, writing the annotated frame to `output`.
    ///
    /// Only a failure to write `output` (or a backend fault) is an error;
    /// unreadable input, no eye and no circle are verdicts.
    pub fn scan(&self, source: &Path, output: &Path) -> Result<ScanReport, ScanError> {
        let mut report = ScanReport {
            verdict: Verdict::NoEyeDetected,
            message: String::new(),
            output_path: output.to_path_buf(),
            regions: 0,
            circles: Vec::new(),
            selected: None,
        };

        let Some(image) = load_image(source)? else {
            info!("{:?} could not be decoded, reporting no eye", source);
            let canvas = blank_canvas(&self.config.preprocess)?;
            return self.finish(report, &canvas);
        };

        let mut frame = preprocess(&image, &self.config.preprocess)?;

        let regions = self.regions.detect(&frame.gray)?;
        report.regions = regions.len();
        if regions.is_empty() {
            info!("No eye regions in {:?}", source);
            return self.finish(report, &frame.color);
        }
        debug!("Eye regions: {:?}", regions);

        let circles = self.circles.locate(&frame.gray, frame.search_radius)?;
        draw_circles(&mut frame.color, &circles, &self.config.annotation)?;

        let selected = self.config.circles.selection.select(&circles, frame.size());
        report.circles = circles;
        let Some(circle) = selected else {
            info!("No circles detected in {:?}", source);
            report.verdict = Verdict::NoCircleDetected;
            return self.finish(report, &frame.color);
        };
        report.selected = Some(circle);

        let verdict = self.scorer.evaluate(&frame.gray, &circle)?;
        report.verdict = verdict;
        annotate_verdict(&mut frame.color, &verdict.to_string(), &self.config.annotation)?;

        self.finish(report, &frame.color)
    }

    /// Same as [`scan`](Self::scan) but returns only the caller-facing text
    pub fn detect(&self, source: &Path, output: &Path) -> Result<String, ScanError> {
        Ok(self.scan(source, output)?.message)
    }

    fn finish(&self, mut report: ScanReport, color: &Mat) -> Result<ScanReport, ScanError> {
        write_output(&report.output_path, color)?;
        report.message = report.verdict.message(&self.config.report);
        info!("Verdict for {:?}: {}", report.output_path, report.message);
        Ok(report)
    }
}

fn write_output(path: &Path, color: &Mat) -> Result<(), ScanError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ScanError::Processing(format!("Output path {:?} is not valid UTF-8", path)))?;

    let written = imgcodecs::imwrite(path_str, color, &Vector::new())?;
    if !written {
        return Err(ScanError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to write output image {:?}", path),
        )));
    }
    debug!("Wrote {:?}", path);
    Ok(())
}

/// Scan `source_path` with the default configuration (plus environment
/// overrides) and write the annotated image to `output_path`.
pub fn detect(source_path: &str, output_path: &str) -> Result<String, ScanError> {
    let detector = CataractDetector::new(ScanConfig::default().with_env_overrides())?;
    detector.detect(Path::new(source_path), Path::new(output_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use opencv::core::{Scalar, CV_8UC3};
    use tempfile::TempDir;

    struct NoRegions;

    impl RegionDetector for NoRegions {
        fn detect(&self, _gray: &Mat) -> Result<Vec<Region>, ScanError> {
            Ok(Vec::new())
        }
    }

    struct PanicCircles;

    impl CircleLocator for PanicCircles {
        fn locate(&self, _gray: &Mat, _min_distance: f64) -> Result<Vec<Circle>, ScanError> {
            panic!("circle search must not run without a region");
        }
    }

    fn write_png(dir: &TempDir, name: &str, value: f64) -> PathBuf {
        let path = dir.path().join(name);
        let mat = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(value)).unwrap();
        imgcodecs::imwrite(path.to_str().unwrap(), &mat, &Vector::new()).unwrap();
        path
    }

    #[test]
    fn test_region_gate_stops_before_circles() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, "in.png", 50.0);
        let output = dir.path().join("out.png");

        let detector =
            CataractDetector::with_backends(ScanConfig::default(), Box::new(NoRegions), Box::new(PanicCircles))
                .unwrap();
        let report = detector.scan(&source, &output).unwrap();
        assert_eq!(report.verdict, Verdict::NoEyeDetected);
        assert_eq!(report.message, "No Eyes Detected");
        assert_eq!(report.regions, 0);
        assert!(output.exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScanConfig::default();
        config.preprocess.blur_kernel = 2;
        let result = CataractDetector::with_backends(config, Box::new(NoRegions), Box::new(PanicCircles));
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn test_unwritable_output_is_error() {
        let dir = TempDir::new().unwrap();
        let source = write_png(&dir, "in.png", 50.0);
        let output = dir.path().join("missing-dir").join("out.png");

        let detector =
            CataractDetector::with_backends(ScanConfig::default(), Box::new(NoRegions), Box::new(PanicCircles))
                .unwrap();
        assert!(detector.scan(&source, &output).is_err());
    }

    #[test]
    fn test_new_without_cascade_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = ScanConfig::default();
        config.model_path = dir.path().to_path_buf();
        config.region.cascade_path = None;
        match CataractDetector::new(config) {
            Err(ScanError::Model(msg)) => assert!(msg.contains("not found")),
            Err(e) => panic!("Expected Model error, got {e}"),
            Ok(_) => panic!("Expected Model error"),
        }
    }
}
