//! Content hashing used to detect configuration and dashboard changes.

use sha2::{Digest, Sha256};

/// Hex SHA-256 over the concatenation of `parts`
pub fn content_hash<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let hash = content_hash(&["{}", ""]);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash(&["{}"]));
        assert_eq!(
            content_hash(&[""]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash(&["a"]), content_hash(&["b"]));
    }
}
