use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::pipeline::PassKind;

#[derive(Parser, Debug)]
#[command(
    name = "sectionist",
    version,
    about = "Section numbering, tables of contents and term cross-references for markup documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the enabled passes over a batch of documents.
    Process(ProcessArgs),
    /// Print a document's outline as JSON.
    Outline(OutlineArgs),
    /// Collect definitions into a term database.
    Terms(TermsArgs),
}

/// Flags shared by every command that reads definitions.
#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
    /// JSON file with default processing options.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Continue section numbers across documents instead of restarting.
    #[arg(long, default_value_t = false)]
    pub shared_numbering: bool,

    #[arg(long = "allow-duplicate-dfns", default_value_t = false)]
    pub allow_duplicate_definitions: bool,

    #[arg(long = "force-legacy-ids", default_value_t = false)]
    pub force_legacy_identifiers: bool,

    /// Wider instance element set, stricter term normalization and classed
    /// nested TOC lists.
    #[arg(long = "compat", default_value_t = false)]
    pub compatibility_mode: bool,

    /// Absolute URL of a term database or document to take definitions from.
    #[arg(long = "xref-source")]
    pub external_sources: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[arg(long, default_value = "build")]
    pub out_dir: PathBuf,

    /// Overwrite the input files.
    #[arg(long, default_value_t = false, conflicts_with = "out_dir")]
    pub in_place: bool,

    /// Address the documents will be published under; file names are
    /// resolved against it.
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long = "skip", value_enum)]
    pub skipped_passes: Vec<PassKind>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[command(flatten)]
    pub options: OptionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OutlineArgs {
    pub file: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TermsArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[arg(long, default_value = "terms.json")]
    pub output: PathBuf,

    #[arg(long)]
    pub base_url: Option<String>,

    /// Name recorded in the database.
    #[arg(long, default_value = "terms")]
    pub name: String,

    #[command(flatten)]
    pub options: OptionArgs,
}
