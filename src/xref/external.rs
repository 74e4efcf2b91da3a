use std::fs;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use super::{TermTable, TermTarget, collect_definitions, normalize_term};
use crate::config::ProcessOptions;
use crate::dom::markup::MarkupReader;
use crate::error::ProcessError;
use crate::ids::IdRegistry;
use crate::model::TermDatabase;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("sectionist/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub content_type: Option<String>,
    pub body: String,
}

impl LoadedSource {
    fn is_json(&self, address: &Url) -> bool {
        match &self.content_type {
            Some(content_type) => content_type
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().ends_with("json")),
            None => address.path().ends_with(".json"),
        }
    }
}

/// Fetches the raw content of an external source.
pub trait SourceLoader {
    fn load(&self, address: &Url) -> Result<LoadedSource>;
}

/// Loads `file:` URLs from disk and `http(s):` URLs with a blocking client.
pub struct HttpSourceLoader {
    client: reqwest::blocking::Client,
}

impl HttpSourceLoader {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl SourceLoader for HttpSourceLoader {
    fn load(&self, address: &Url) -> Result<LoadedSource> {
        match address.scheme() {
            "file" => {
                let path = address
                    .to_file_path()
                    .map_err(|_| anyhow!("not a local file path: {address}"))?;
                let body = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(LoadedSource {
                    content_type: None,
                    body,
                })
            }
            "http" | "https" => {
                let response = self
                    .client
                    .get(address.clone())
                    .send()
                    .with_context(|| format!("failed to fetch {address}"))?;
                let status = response.status();
                if !status.is_success() {
                    bail!("HTTP error {} fetching {address}", status.as_u16());
                }
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let body = response
                    .text()
                    .with_context(|| format!("failed to read response from {address}"))?;
                Ok(LoadedSource { content_type, body })
            }
            other => bail!("unsupported scheme `{other}`"),
        }
    }
}

fn source_error(address: &str, reason: impl Into<String>) -> ProcessError {
    ProcessError::ExternalSource {
        address: address.to_string(),
        reason: reason.into(),
    }
}

/// Loads one external source into `table`. JSON sources are read as a term
/// database; anything else is parsed as markup and its definitions collected
/// with the source address as their document. Returns the number of terms
/// added.
pub fn load_terms(
    address: &str,
    loader: &dyn SourceLoader,
    reader: &MarkupReader,
    table: &mut TermTable,
    options: &ProcessOptions,
) -> Result<usize, ProcessError> {
    let url = Url::parse(address).map_err(|err| source_error(address, format!("not an absolute URL: {err}")))?;
    if !matches!(url.scheme(), "http" | "https" | "file") {
        return Err(source_error(
            address,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }

    let loaded = loader
        .load(&url)
        .map_err(|err| source_error(address, format!("{err:#}")))?;
    debug!(
        source = %address,
        bytes = loaded.body.len(),
        content_type = loaded.content_type.as_deref().unwrap_or("-"),
        "fetched external source"
    );

    if loaded.is_json(&url) {
        let database: TermDatabase = serde_json::from_str(&loaded.body)
            .map_err(|err| source_error(address, format!("invalid term database: {err}")))?;
        merge_database(&database, address, table, options)
    } else {
        let mut doc = reader.parse(&loaded.body);
        let mut registry = IdRegistry::new();
        collect_definitions(
            &mut doc,
            &mut registry,
            table,
            Some(url.as_str()),
            address,
            options,
        )
    }
}

/// Adds every definition of `database`. Values holding a `#` after other
/// text are absolute references; anything else is a fragment of the
/// database's `url`.
pub fn merge_database(
    database: &TermDatabase,
    label: &str,
    table: &mut TermTable,
    options: &ProcessOptions,
) -> Result<usize, ProcessError> {
    for (term, value) in &database.definitions {
        let reference = match value.find('#') {
            Some(index) if index > 0 => value.clone(),
            _ => format!("{}#{}", database.url, value.trim_start_matches('#')),
        };
        table.define(
            normalize_term(term, options.compatibility_mode),
            TermTarget::from_reference(&reference),
            options.allow_duplicate_definitions,
            label,
        )?;
    }
    Ok(database.definitions.len())
}

/// Exports `table` as a term database whose values are absolute references.
pub fn to_database(table: &TermTable, name: &str) -> TermDatabase {
    TermDatabase {
        name: name.to_string(),
        url: String::new(),
        definitions: table
            .iter()
            .map(|(term, target)| (term.clone(), target.absolute()))
            .collect(),
    }
}
