//! Utility functions and helpers for the ShopSight application

use std::path::Path;

/// Validate that a file has an allowed extension
pub(crate) fn validate_file_extension(filename: &str, allowed_extensions: &[&str]) -> bool {
    if let Some(ext) = Path::new(filename).extension() {
        if let Some(ext_str) = ext.to_str() {
            return allowed_extensions
                .iter()
                .any(|&e| e.eq_ignore_ascii_case(ext_str));
        }
    }
    false
}
