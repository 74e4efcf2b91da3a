use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::ProcessArgs;
use crate::commands::{load_files, resolve_options};
use crate::dom::markup::{MarkupReader, serialize};
use crate::model::{DocumentReport, DocumentStats, ProcessRunManifest};
use crate::pipeline::{SourceDocument, run_batch};
use crate::util::{
    now_utc_string, sha256_bytes, sha256_file, utc_compact_string, write_json_pretty, write_text,
};


const MANIFEST_FILE: &str = "process_manifest.json";

pub fn run(args: ProcessArgs) -> Result<()> {
    let manifest = process(&args)?;

    if args.dry_run {
        info!(
            documents = manifest.document_count,
            sections = manifest.totals.numbered_sections,
            links = manifest.totals.links,
            "process dry-run complete"
        );
        return Ok(());
    }

    if let Some(manifest_path) = manifest_path(&args) {
        write_json_pretty(&manifest_path, &manifest)?;
        info!(path = %manifest_path.display(), "wrote process manifest");
    }
    info!(
        run_id = %manifest.run_id,
        documents = manifest.document_count,
        sections = manifest.totals.numbered_sections,
        toc_entries = manifest.totals.toc_entries,
        definitions = manifest.totals.definitions,
        links = manifest.totals.links,
        "process completed"
    );
    Ok(())
}

fn manifest_path(args: &ProcessArgs) -> Option<PathBuf> {
    match (&args.manifest_path, args.in_place) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => None,
        (None, false) => Some(args.out_dir.join(MANIFEST_FILE)),
    }
}

/// Reads, processes and (unless this is a dry run) writes every document,
/// returning the run manifest.
pub fn process(args: &ProcessArgs) -> Result<ProcessRunManifest> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let options = resolve_options(&args.options)?.without_passes(&args.skipped_passes);
    options.validate()?;
    info!(
        run_id = %run_id,
        documents = args.files.len(),
        passes = ?options.passes,
        "starting process run"
    );

    let reader = MarkupReader::new()?;
    let loaded = load_files(&args.files, args.base_url.as_deref(), &reader)?;
    let outputs = output_paths(args, loaded.iter().map(|file| &file.path))?;

    let (inputs, mut sources): (Vec<_>, Vec<SourceDocument>) = loaded
        .into_iter()
        .map(|file| ((file.path, file.input_sha256), file.source))
        .unzip();
    run_batch(&mut sources, &options).context("processing failed")?;

    let mut totals = DocumentStats::default();
    let mut documents = Vec::with_capacity(sources.len());
    for (((source_path, input_sha256), source), output_path) in
        inputs.into_iter().zip(&sources).zip(outputs)
    {
        let markup = serialize(&source.document);
        let output_sha256 = if args.dry_run {
            sha256_bytes(markup.as_bytes())
        } else {
            write_text(&output_path, &markup)?;
            info!(
                document = %source.label,
                path = %output_path.display(),
                "wrote document"
            );
            sha256_file(&output_path)?
        };
        totals += source.stats;
        documents.push(DocumentReport {
            source_path: source_path.display().to_string(),
            address: source.address.clone(),
            output_path: (!args.dry_run).then(|| output_path.display().to_string()),
            input_sha256,
            output_sha256,
            stats: source.stats,
        });
    }

    Ok(ProcessRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        completed_at: now_utc_string(),
        dry_run: args.dry_run,
        in_place: args.in_place,
        output_directory: (!args.in_place).then(|| args.out_dir.display().to_string()),
        options,
        document_count: documents.len(),
        totals,
        documents,
    })
}

fn output_paths<'a>(
    args: &ProcessArgs,
    inputs: impl Iterator<Item = &'a PathBuf>,
) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut outputs = Vec::new();
    for input in inputs {
        let output = if args.in_place {
            input.clone()
        } else {
            let name = input
                .file_name()
                .with_context(|| format!("not a file: {}", input.display()))?;
            args.out_dir.join(name)
        };
        if !seen.insert(output.clone()) {
            bail!("two inputs would be written to {}", output.display());
        }
        outputs.push(output);
    }
    Ok(outputs)
}
