use anyhow::{anyhow, Result};

use crate::metrics::money::DEFAULT_CURRENCY;

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_CONTEXT_WINDOW_CHARS: usize = 100;
pub const MAX_CONTEXT_WINDOW_CHARS: usize = 200;
pub const DEFAULT_EXCERPT_CHARS: usize = 15_000;
pub const MIN_EXCERPT_CHARS: usize = 2_000;

#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionConfig {
    /// Documents larger than this are refused before any extraction runs.
    pub max_document_bytes: usize,
    /// Characters kept on each side of a match as its context.
    pub context_window_chars: usize,
    /// Length of the raw excerpt attached to each statement.
    pub excerpt_chars: usize,
    pub currency: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            context_window_chars: DEFAULT_CONTEXT_WINDOW_CHARS,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer, got {:?}", key, raw)),
        Err(_) => Ok(None),
    }
}

impl ExtractionConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let max_document_bytes = env_usize("FILING_METRICS_MAX_DOCUMENT_BYTES")?
            .unwrap_or(defaults.max_document_bytes);
        if max_document_bytes == 0 {
            return Err(anyhow!("FILING_METRICS_MAX_DOCUMENT_BYTES must be positive"));
        }

        let context_window_chars = env_usize("FILING_METRICS_CONTEXT_WINDOW")?
            .unwrap_or(defaults.context_window_chars);

        let excerpt_chars =
            env_usize("FILING_METRICS_EXCERPT_CHARS")?.unwrap_or(defaults.excerpt_chars);

        let currency = std::env::var("FILING_METRICS_CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .unwrap_or(defaults.currency);

        Ok(Self {
            max_document_bytes,
            context_window_chars,
            excerpt_chars,
            currency,
        }
        .clamped())
    }

    /// Pulls window and excerpt sizes into their supported ranges.
    pub fn clamped(mut self) -> Self {
        self.context_window_chars = self.context_window_chars.min(MAX_CONTEXT_WINDOW_CHARS);
        self.excerpt_chars = self
            .excerpt_chars
            .clamp(MIN_EXCERPT_CHARS, DEFAULT_EXCERPT_CHARS);
        self
    }
}
