use anyhow::{Context, Result};
use tracing::info;

use crate::cli::TermsArgs;
use crate::commands::{LoadedFile, load_files, resolve_options};
use crate::dom::markup::MarkupReader;
use crate::model::TermDatabase;
use crate::outline::OutlineCache;
use crate::pipeline::{IdentifierPass, Pass, PassContext, PassKind};
use crate::util::write_json_pretty;
use crate::xref::{TermTable, collect_definitions, external};

pub fn run(args: TermsArgs) -> Result<()> {
    let database = build_database(&args)?;
    write_json_pretty(&args.output, &database)?;
    info!(
        path = %args.output.display(),
        terms = database.definitions.len(),
        "wrote term database"
    );
    Ok(())
}

/// Collects the definitions of every file. Section identifiers are assigned
/// first when that pass is enabled, so anchors match what `process` writes.
pub fn build_database(args: &TermsArgs) -> Result<TermDatabase> {
    let options = resolve_options(&args.options)?;
    let reader = MarkupReader::new()?;
    let mut loaded = load_files(&args.files, args.base_url.as_deref(), &reader)?;

    if options.passes.contains(&PassKind::Identifiers) {
        let mut outlines = OutlineCache::new();
        let mut cx = PassContext {
            outlines: &mut outlines,
            options: &options,
        };
        let mut pass = IdentifierPass;
        for LoadedFile { source, .. } in &mut loaded {
            pass.apply(source, &mut cx)
                .context("failed to assign section identifiers")?;
        }
    }

    let mut table = TermTable::new();
    for LoadedFile { source, .. } in &mut loaded {
        let found = collect_definitions(
            &mut source.document,
            &mut source.ids,
            &mut table,
            source.address.as_deref(),
            &source.label,
            &options,
        )?;
        info!(document = %source.label, definitions = found, "collected definitions");
    }

    let mut database = external::to_database(&table, &args.name);
    if let Some(base_url) = &args.base_url {
        database.url = base_url.clone();
    }
    Ok(database)
}
