//! Request fingerprints
//!
//! A fingerprint is the SHA-256 of a canonical encoding of the fields that
//! determine a response: the normalized message, the model family and
//! `max_tokens`. The priority mode only affects who answers, not what the
//! answer is, so it is left out.

use crate::request::ChatRequest;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Bumped whenever the canonical encoding changes
const FINGERPRINT_VERSION: &str = "v1";

/// Field separator in the canonical encoding (ASCII unit separator)
const SEP: char = '\u{1f}';

/// Deterministic cache key for a request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a request
    #[must_use]
    pub fn of(request: &ChatRequest) -> Self {
        let family = request
            .model_hint
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map_or_else(|| "auto".to_string(), str::to_lowercase);

        let canonical = format!(
            "{FINGERPRINT_VERSION}{SEP}{family}{SEP}{}{SEP}{}",
            request.max_tokens,
            normalize_message(&request.message)
        );

        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Hex digest
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim and collapse internal whitespace runs to a single space
#[must_use]
pub fn normalize_message(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}
