//! Cascade manager with auto-download functionality

use crate::config::ScanConfig;
use crate::error::ScanError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub const EYE_CASCADE_FILE: &str = "haarcascade_eye.xml";

/// Eye cascade shipped with the OpenCV source tree
const EYE_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_eye.xml";
const EYE_CASCADE_CHECKSUM: &str = ""; // unpinned: the 4.x branch copy can change

const MAX_CASCADE_SIZE: usize = 50_000_000;
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Downloads and locates pretrained cascade files
pub struct CascadeManager {
    config: Arc<ScanConfig>,
}

impl CascadeManager {
    pub fn new(config: Arc<ScanConfig>) -> Self {
        Self { config }
    }

    /// Ensure the model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, ScanError> {
        let model_path = &self.config.model_path;
        if !model_path.exists() {
            fs::create_dir_all(model_path)?;
            info!("Created model directory: {:?}", model_path);
        }
        Ok(model_path.clone())
    }

    /// Download `name` from `url` into the model directory unless present.
    ///
    /// An empty `checksum` skips SHA-256 verification.
    pub async fn ensure_cascade(&self, name: &str, url: &str, checksum: &str) -> Result<PathBuf, ScanError> {
        if name.is_empty() || name.len() > 255 {
            return Err(ScanError::Model("Invalid cascade name".to_string()));
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(ScanError::Model("Cascade name contains invalid characters".to_string()));
        }
        if url.is_empty() || url.len() > 2048 {
            return Err(ScanError::Model("Invalid URL".to_string()));
        }
        if !url.starts_with("https://") {
            return Err(ScanError::Model("Only HTTPS URLs are allowed for cascade downloads".to_string()));
        }

        let model_dir = self.ensure_model_dir()?;
        let cascade_path = model_dir.join(name);

        if cascade_path.exists() {
            info!("Cascade {} already exists at {:?}", name, cascade_path);
            return Ok(cascade_path);
        }

        info!("Downloading cascade {} from {}", name, url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ScanError::Model(format!(
                "Failed to download cascade: HTTP {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_CASCADE_SIZE as u64 {
                return Err(ScanError::Model(format!(
                    "Cascade too large: {} bytes (max {} bytes)",
                    content_length, MAX_CASCADE_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_CASCADE_SIZE {
            return Err(ScanError::Model(format!(
                "Downloaded cascade too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_CASCADE_SIZE
            )));
        }
        if bytes.len() < 1024 {
            return Err(ScanError::Model("Downloaded file too small, likely corrupted".to_string()));
        }

        verify_checksum(name, &bytes, checksum)?;

        // Temp file then rename so a partial download never looks complete
        let temp_path = cascade_path.with_extension("xml.tmp");
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &cascade_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        info!("Cascade {} saved to {:?}", name, cascade_path);
        Ok(cascade_path)
    }

    /// Eye cascade path, downloading if needed
    pub async fn get_eye_cascade(&self) -> Result<PathBuf, ScanError> {
        self.ensure_cascade(EYE_CASCADE_FILE, EYE_CASCADE_URL, EYE_CASCADE_CHECKSUM)
            .await
    }
}

fn verify_checksum(name: &str, bytes: &[u8], checksum: &str) -> Result<(), ScanError> {
    if checksum.is_empty() {
        info!("Downloaded {} bytes for {} (checksum verification skipped)", bytes.len(), name);
        return Ok(());
    }

    let computed = hex::encode(Sha256::digest(bytes));
    if !computed.eq_ignore_ascii_case(checksum) {
        return Err(ScanError::Model(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            name, checksum, computed
        )));
    }
    info!("Verified checksum for {}", name);
    Ok(())
}
