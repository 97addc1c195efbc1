//! cataract-core: single-image cataract screening
//!
//! Loads an eye photograph, normalises it to a canonical frame, gates on a
//! cascade eye detector, locates the iris boundary with a Hough circle
//! transform and scores the surrounding intensity. The color frame is
//! annotated with the detected circles and the verdict and always written
//! back out.
//!
//! ```no_run
//! let verdict = cataract_core::detect("uploads/eye.jpg", "output_images/eye.jpg")?;
//! println!("{}", verdict);
//! # Ok::<(), cataract_core::ScanError>(())
//! ```

pub mod cascade;
pub mod circles;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod preprocess;
pub mod region;
pub mod scoring;

pub use cascade::CascadeManager;
pub use circles::{Circle, CircleLocator, CircleSelection, HoughCircleLocator};
pub use config::ScanConfig;
pub use error::ScanError;
pub use pipeline::{detect, CataractDetector, ScanReport};
pub use region::{CascadeEyeDetector, Region, RegionDetector};
pub use scoring::{CataractScorer, Verdict};
