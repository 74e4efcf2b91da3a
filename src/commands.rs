pub mod outline;
pub mod process;
pub mod terms;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use url::Url;

use crate::cli::OptionArgs;
use crate::config::ProcessOptions;
use crate::dom::markup::MarkupReader;
use crate::pipeline::SourceDocument;
use crate::util::sha256_bytes;

/// A document read from disk along with what the run manifest records about
/// its input.
pub struct LoadedFile {
    pub path: PathBuf,
    pub input_sha256: String,
    pub source: SourceDocument,
}

/// Config file first, then every flag that was given on the command line.
pub fn resolve_options(args: &OptionArgs) -> Result<ProcessOptions> {
    let mut options = match &args.config {
        Some(path) => ProcessOptions::load(path)?,
        None => ProcessOptions::default(),
    };
    if args.shared_numbering {
        options.per_file_numbering = false;
    }
    if args.allow_duplicate_definitions {
        options.allow_duplicate_definitions = true;
    }
    if args.force_legacy_identifiers {
        options.force_legacy_identifiers = true;
    }
    if args.compatibility_mode {
        options.compatibility_mode = true;
    }
    options
        .external_sources
        .extend(args.external_sources.iter().cloned());
    Ok(options)
}

/// The address a document is published at: its file name resolved against
/// `base_url`, or its absolute `file:` URL.
pub fn document_address(path: &Path, base_url: Option<&str>) -> Result<String> {
    match base_url {
        Some(base) => {
            let base =
                Url::parse(base).with_context(|| format!("invalid base URL: {base}"))?;
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;
            let address = base
                .join(name)
                .with_context(|| format!("failed to resolve {name} against {base}"))?;
            Ok(address.to_string())
        }
        None => {
            let absolute = fs::canonicalize(path)
                .with_context(|| format!("failed to resolve {}", path.display()))?;
            let address = Url::from_file_path(&absolute)
                .map_err(|_| anyhow!("not an absolute path: {}", absolute.display()))?;
            Ok(address.to_string())
        }
    }
}

pub fn load_files(
    paths: &[PathBuf],
    base_url: Option<&str>,
    reader: &MarkupReader,
) -> Result<Vec<LoadedFile>> {
    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let address = document_address(path, base_url)?;
        let document = reader.parse(&text);
        debug!(path = %path.display(), address = %address, bytes = text.len(), "parsed document");
        loaded.push(LoadedFile {
            path: path.clone(),
            input_sha256: sha256_bytes(text.as_bytes()),
            source: SourceDocument::new(path.display().to_string(), Some(address), document),
        });
    }
    Ok(loaded)
}
