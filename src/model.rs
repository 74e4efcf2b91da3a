use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::config::ProcessOptions;

/// Exchange format for term tables. Each definition maps a normalized term to
/// either a fragment of `url` or an absolute reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDatabase {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub definitions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub numbered_sections: usize,
    pub toc_entries: usize,
    pub definitions: usize,
    pub links: usize,
}

impl AddAssign for DocumentStats {
    fn add_assign(&mut self, other: Self) {
        self.numbered_sections += other.numbered_sections;
        self.toc_entries += other.toc_entries;
        self.definitions += other.definitions;
        self.links += other.links;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub source_path: String,
    pub address: Option<String>,
    pub output_path: Option<String>,
    pub input_sha256: String,
    pub output_sha256: String,
    pub stats: DocumentStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub completed_at: String,
    pub dry_run: bool,
    pub in_place: bool,
    pub output_directory: Option<String>,
    pub options: ProcessOptions,
    pub document_count: usize,
    pub totals: DocumentStats,
    pub documents: Vec<DocumentReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineEntry {
    pub depth: usize,
    pub element: String,
    pub id: Option<String>,
    pub header_element: Option<String>,
    pub rank: Option<u8>,
    pub header_text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlineReport {
    pub source_path: String,
    pub generated_at: String,
    pub section_count: usize,
    pub sections: Vec<OutlineEntry>,
}
