// Upload intake rules: which files may be scanned and where their output goes

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// True when the name has a dot and its last extension is allow-listed
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Reduce a client-supplied name to a safe flat file name.
///
/// Letters are NFKD-decomposed and reduced to ASCII, separators become
/// whitespace, whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]`
/// is dropped and leading/trailing `.`/`_` are trimmed.
pub fn secure_filename(filename: &str) -> String {
    let flattened: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Validate `source` and derive `<output_dir>/<sanitised name>`
pub fn output_path_for(source: &Path, output_dir: &Path) -> Result<PathBuf> {
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Source path {:?} has no usable file name", source))?;

    if !allowed_file(filename) {
        return Err(anyhow!(
            "Unsupported file type {:?} (allowed: {})",
            filename,
            ALLOWED_EXTENSIONS.join(", ")
        ));
    }

    let safe = secure_filename(filename);
    if safe.is_empty() || !allowed_file(&safe) {
        return Err(anyhow!("File name {:?} is empty after sanitising", filename));
    }

    Ok(output_dir.join(safe))
}

/// Derive the output path for `source` and make sure its directory exists
pub fn prepare_output(source: &Path, output_dir: &Path) -> Result<PathBuf> {
    let path = output_path_for(source, output_dir)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    Ok(path)
}
