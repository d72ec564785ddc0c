//! Content fingerprints for change detection.
//!
//! A fingerprint is the lowercase hex MD5 of the content's UTF-8
//! bytes, the same value the documentation crawler emits. It is used purely as an equality oracle by the upsert protocol:
//! equal fingerprints mean "same content, skip all work".
//!
//! # Example
//!
//! ```rust
//! use docspan_core::checksum::fingerprint;
//!
//! assert_eq!(fingerprint("hello world").len(), 32);
//! ```

use md5::{Digest, Md5};

use crate::error::{CoreError, Result};

/// Length in hex characters of every fingerprint.
pub const FINGERPRINT_LEN: usize = 32;

/// Fingerprint text content.
pub fn fingerprint(content: &str) -> String {
    hex::encode(Md5::digest(content.as_bytes()))
}

/// Fingerprint raw bytes, rejecting anything that is not valid UTF-8.
pub fn fingerprint_bytes(bytes: &[u8]) -> Result<String> {
    let text = decode_utf8(bytes)?;
    Ok(fingerprint(text))
}

/// Decode bytes as UTF-8 text or fail with [`CoreError::InvalidInput`].
pub fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| {
        CoreError::InvalidInput(format!(
            "content is not valid UTF-8 (invalid byte at offset {})",
            e.valid_up_to()
        ))
    })
}
