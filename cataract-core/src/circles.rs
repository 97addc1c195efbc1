//! Iris/pupil boundary localisation

use crate::config::{AnnotationConfig, CircleConfig};
use crate::error::ScanError;
use opencv::core::{Mat, Point, Scalar, Vec3f, Vector};
use opencv::imgproc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Circle candidate in canonical image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub center_x: i32,
    pub center_y: i32,
    pub radius: i32,
}

impl Circle {
    pub fn new(center_x: i32, center_y: i32, radius: i32) -> Self {
        Self {
            center_x,
            center_y,
            radius,
        }
    }

    /// Round a sub-pixel Hough result to pixel units, ties to even
    fn from_hough(raw: Vec3f) -> Self {
        let round = |v: f32| v.round_ties_even().max(0.0) as i32;
        Self::new(round(raw[0]), round(raw[1]), round(raw[2]))
    }

    /// Integer squared distance from the center is within the radius
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let dx = i64::from(x - self.center_x);
        let dy = i64::from(y - self.center_y);
        let r = i64::from(self.radius);
        dx * dx + dy * dy <= r * r
    }
}

/// Which detected circle is carried forward for scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleSelection {
    /// Order reported by the locator, first element wins
    #[default]
    First,
    /// Largest radius, earliest on ties
    Largest,
    /// Center nearest to the frame center, earliest on ties
    MostCentral,
}

impl CircleSelection {
    pub fn select(&self, circles: &[Circle], frame: (i32, i32)) -> Option<Circle> {
        match self {
            CircleSelection::First => circles.first().copied(),
            CircleSelection::Largest => circles
                .iter()
                .copied()
                .reduce(|best, c| if c.radius > best.radius { c } else { best }),
            CircleSelection::MostCentral => {
                let (cx, cy) = (i64::from(frame.0 / 2), i64::from(frame.1 / 2));
                let dist = |c: &Circle| {
                    let dx = i64::from(c.center_x) - cx;
                    let dy = i64::from(c.center_y) - cy;
                    dx * dx + dy * dy
                };
                circles
                    .iter()
                    .copied()
                    .reduce(|best, c| if dist(&c) < dist(&best) { c } else { best })
            }
        }
    }
}

/// Anything that can find circular boundaries in a grayscale frame.
///
/// `min_distance` is the minimum separation between reported centers.
pub trait CircleLocator: Send + Sync {
    fn locate(&self, gray: &Mat, min_distance: f64) -> Result<Vec<Circle>, ScanError>;
}

/// OpenCV gradient Hough transform
pub struct HoughCircleLocator {
    config: CircleConfig,
}

impl HoughCircleLocator {
    pub fn new(config: CircleConfig) -> Self {
        Self { config }
    }
}

impl CircleLocator for HoughCircleLocator {
    fn locate(&self, gray: &Mat, min_distance: f64) -> Result<Vec<Circle>, ScanError> {
        let min_radius = i32::try_from(self.config.min_radius)
            .map_err(|_| ScanError::Config("min_radius out of range".to_string()))?;
        let max_radius = i32::try_from(self.config.max_radius)
            .map_err(|_| ScanError::Config("max_radius out of range".to_string()))?;

        let mut raw = Vector::<Vec3f>::new();
        imgproc::hough_circles(
            gray,
            &mut raw,
            imgproc::HOUGH_GRADIENT,
            self.config.accumulator_ratio,
            min_distance,
            self.config.edge_threshold,
            self.config.vote_threshold,
            min_radius,
            max_radius,
        )?;

        let circles: Vec<Circle> = raw.iter().map(Circle::from_hough).collect();
        debug!("Hough transform found {} circles", circles.len());
        Ok(circles)
    }
}

/// Outline every circle and mark its center on the color buffer
pub fn draw_circles(color: &mut Mat, circles: &[Circle], style: &AnnotationConfig) -> Result<(), ScanError> {
    let outline = bgr(style.outline_color);
    let center = bgr(style.center_color);

    for circle in circles {
        let origin = Point::new(circle.center_x, circle.center_y);
        imgproc::circle(color, origin, circle.radius, outline, style.outline_thickness, imgproc::LINE_8, 0)?;
        imgproc::circle(color, origin, style.center_radius, center, style.center_thickness, imgproc::LINE_8, 0)?;
    }
    Ok(())
}

pub(crate) fn bgr((b, g, r): (u8, u8, u8)) -> Scalar {
    Scalar::new(f64::from(b), f64::from(g), f64::from(r), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Vec3b, CV_8UC1, CV_8UC3};
    use opencv::prelude::*;

    #[test]
    fn test_from_hough_rounds_half_to_even() {
        let circle = Circle::from_hough(Vec3f::from([248.5, 249.5, 80.5]));
        assert_eq!(circle, Circle::new(248, 250, 80));

        let circle = Circle::from_hough(Vec3f::from([10.4, 10.6, 3.0]));
        assert_eq!(circle, Circle::new(10, 11, 3));
    }

    #[test]
    fn test_contains_boundary_is_inside() {
        let circle = Circle::new(10, 10, 5);
        assert!(circle.contains(10, 10));
        assert!(circle.contains(15, 10));
        assert!(circle.contains(13, 14)); // 9 + 16 = 25
        assert!(!circle.contains(14, 14)); // 16 + 16 = 32
        assert!(!circle.contains(16, 10));
    }

    #[test]
    fn test_selection_first() {
        let circles = [Circle::new(1, 1, 5), Circle::new(250, 250, 90)];
        assert_eq!(CircleSelection::First.select(&circles, (500, 500)), Some(circles[0]));
        assert_eq!(CircleSelection::First.select(&[], (500, 500)), None);
    }

    #[test]
    fn test_selection_largest() {
        let circles = [Circle::new(1, 1, 5), Circle::new(40, 40, 90), Circle::new(80, 80, 90)];
        assert_eq!(CircleSelection::Largest.select(&circles, (500, 500)), Some(circles[1]));
    }

    #[test]
    fn test_selection_most_central() {
        let circles = [Circle::new(10, 10, 50), Circle::new(240, 260, 5), Circle::new(400, 400, 9)];
        assert_eq!(CircleSelection::MostCentral.select(&circles, (500, 500)), Some(circles[1]));
    }

    #[test]
    fn test_selection_serde_names() {
        let json = serde_json::to_string(&CircleSelection::MostCentral).unwrap();
        assert_eq!(json, "\"most_central\"");
    }

    #[test]
    fn test_hough_finds_dark_disk() {
        let mut gray = Mat::new_rows_cols_with_default(500, 500, CV_8UC1, Scalar::all(210.0)).unwrap();
        imgproc::circle(&mut gray, Point::new(250, 250), 100, Scalar::all(30.0), imgproc::FILLED, imgproc::LINE_8, 0)
            .unwrap();
        let mut blurred = Mat::default();
        imgproc::median_blur(&gray, &mut blurred, 5).unwrap();

        let locator = HoughCircleLocator::new(CircleConfig::default());
        let circles = locator.locate(&blurred, 300.0).unwrap();
        assert!(!circles.is_empty());

        let first = circles[0];
        assert!((first.center_x - 250).abs() <= 5);
        assert!((first.center_y - 250).abs() <= 5);
        assert!((first.radius - 100).abs() <= 8);
    }

    #[test]
    fn test_hough_uniform_frame_has_no_circles() {
        let gray = Mat::new_rows_cols_with_default(500, 500, CV_8UC1, Scalar::all(128.0)).unwrap();
        let locator = HoughCircleLocator::new(CircleConfig::default());
        assert!(locator.locate(&gray, 300.0).unwrap().is_empty());
    }

    #[test]
    fn test_draw_circles_marks_center_and_outline() {
        let mut color = Mat::new_rows_cols_with_default(200, 200, CV_8UC3, Scalar::all(0.0)).unwrap();
        draw_circles(&mut color, &[Circle::new(100, 100, 50)], &AnnotationConfig::default()).unwrap();

        assert_eq!(*color.at_2d::<Vec3b>(100, 100).unwrap(), Vec3b::from([0, 0, 255]));
        assert_eq!(*color.at_2d::<Vec3b>(100, 150).unwrap(), Vec3b::from([0, 255, 0]));
        // Between the dot and the outline nothing is drawn
        assert_eq!(*color.at_2d::<Vec3b>(100, 125).unwrap(), Vec3b::from([0, 0, 0]));
    }

    #[test]
    fn test_draw_nothing_for_no_circles() {
        let mut color = Mat::new_rows_cols_with_default(50, 50, CV_8UC3, Scalar::all(7.0)).unwrap();
        draw_circles(&mut color, &[], &AnnotationConfig::default()).unwrap();
        assert_eq!(*color.at_2d::<Vec3b>(25, 25).unwrap(), Vec3b::from([7, 7, 7]));
    }
}
