//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! content addressing where no repository-provided hash exists, and for
//! structural cache keys.

use sha2::{Digest, Sha256};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Checksum of a value's canonical JSON serialization
pub fn compute_structural_checksum<T: serde::Serialize>(value: &T) -> crate::Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(compute_content_checksum(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checksum_has_prefix() {
        let checksum = compute_content_checksum("hello world");
        assert!(checksum.starts_with("sha256:"));
    }

    #[test]
    fn content_checksum_known_value() {
        let checksum = compute_content_checksum("hello world");
        assert_eq!(
            checksum,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn different_content_different_checksum() {
        assert_ne!(compute_content_checksum("aaa"), compute_content_checksum("bbb"));
    }

    #[test]
    fn structural_checksum_follows_field_values() {
        #[derive(serde::Serialize)]
        struct Rule<'a> {
            folder: &'a str,
        }
        let a = compute_structural_checksum(&Rule { folder: "posts" }).unwrap();
        let b = compute_structural_checksum(&Rule { folder: "posts" }).unwrap();
        let c = compute_structural_checksum(&Rule { folder: "pages" }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
