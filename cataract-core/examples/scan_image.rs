//! Scan one eye photograph with the default pipeline
//!
//! cargo run -p cataract-core --example scan_image -- uploads/eye.jpg output_images/eye.jpg

use cataract_core::{CataractDetector, ScanConfig};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: scan_image <source> <output>");
        std::process::exit(1);
    }

    let config = ScanConfig::default().with_env_overrides();
    let detector = CataractDetector::new(config)?;
    let report = detector.scan(Path::new(&args[1]), Path::new(&args[2]))?;

    println!("{}", report.message);
    println!("regions: {}, circles: {}", report.regions, report.circles.len());
    if let Some(circle) = report.selected {
        println!(
            "scored circle: center ({}, {}), radius {}",
            circle.center_x, circle.center_y, circle.radius
        );
    }
    Ok(())
}
