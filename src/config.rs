use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::pipeline::PassKind;

/// Batch-wide processing flags. Every field may be omitted from a config
/// file; missing fields take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessOptions {
    /// Restart section numbering for each document instead of continuing
    /// the count across the batch.
    pub per_file_numbering: bool,
    pub allow_duplicate_definitions: bool,
    pub force_legacy_identifiers: bool,
    pub compatibility_mode: bool,
    /// Absolute URLs of term databases or documents whose definitions are
    /// loaded before any document is processed.
    pub external_sources: Vec<String>,
    pub passes: Vec<PassKind>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            per_file_numbering: true,
            allow_duplicate_definitions: false,
            force_legacy_identifiers: false,
            compatibility_mode: false,
            external_sources: Vec::new(),
            passes: PassKind::ALL.to_vec(),
        }
    }
}

impl ProcessOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let options: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        for (index, kind) in self.passes.iter().enumerate() {
            if self.passes[..index].contains(kind) {
                bail!("pass {kind:?} is listed more than once");
            }
        }
        Ok(())
    }

    pub fn without_passes(mut self, skipped: &[PassKind]) -> Self {
        self.passes.retain(|kind| !skipped.contains(kind));
        self
    }
}
