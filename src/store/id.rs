//! PasteId: the first seven characters of the base64url SHA-256 digest of the paste data.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Length of a paste identifier in characters.
pub const ID_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PasteId(String);

impl PasteId {
    /// Derive the identifier for some paste data.
    pub fn from_data(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut encoded = URL_SAFE_NO_PAD.encode(digest);
        encoded.truncate(ID_LEN);
        Self(encoded)
    }

    /// Wrap an identifier that was already derived, e.g. one read back from a row key.
    pub fn from_row_key(row_key: &str) -> Self {
        Self(row_key.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PasteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PasteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
