//! Principal name generation

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;

use crate::core::ConfigError;

const INVALID_CHARS: &str = r"[^A-Za-z0-9+=,.@_-]";
const SUFFIX_LEN: usize = 8;

/// Generates `<prefix>-<display>-<unix seconds>-<random>` principal names.
///
/// The display name is sanitized so the result is accepted both as an
/// Atlas username and as an API key description.
#[derive(Debug, Clone)]
pub struct PrincipalNamer {
    prefix: String,
    invalid: Regex,
}

impl PrincipalNamer {
    /// Create a namer for the given prefix
    pub fn new(prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let invalid = Regex::new(INVALID_CHARS).map_err(|e| ConfigError::InvalidValue {
            field: "username_prefix".into(),
            reason: e.to_string(),
        })?;
        let namer = Self {
            prefix: String::new(),
            invalid,
        };
        let prefix = namer.sanitize(&prefix.into());
        Ok(Self { prefix, ..namer })
    }

    /// Replace every character Atlas would reject with `_`
    pub fn sanitize(&self, raw: &str) -> String {
        self.invalid.replace_all(raw, "_").into_owned()
    }

    /// Fresh principal name for a requester
    pub fn generate(&self, display_name: &str, now: DateTime<Utc>) -> String {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();

        let display = self.sanitize(display_name);
        if display.is_empty() {
            format!("{}-{}-{}", self.prefix, now.timestamp(), suffix)
        } else {
            format!("{}-{}-{}-{}", self.prefix, display, now.timestamp(), suffix)
        }
    }
}
