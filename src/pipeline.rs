//! Batch driver: runs each enabled pass over every document, collect phase
//! first and apply phase second.

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProcessOptions;
use crate::dom::Document;
use crate::error::ProcessError;
use crate::ids::{self, IdRegistry, IdentifierSyntax};
use crate::model::DocumentStats;
use crate::numbering::NumberingPass;
use crate::outline::OutlineCache;
use crate::toc::TocPass;
use crate::xref::{HttpSourceLoader, SourceLoader, XrefPass};


/// One document of a batch together with its per-document state.
#[derive(Debug)]
pub struct SourceDocument {
    pub label: String,
    /// Absolute address the document will be published at, if known.
    pub address: Option<String>,
    pub document: Document,
    pub ids: IdRegistry,
    pub stats: DocumentStats,
}

impl SourceDocument {
    pub fn new(label: impl Into<String>, address: Option<String>, document: Document) -> Self {
        Self {
            label: label.into(),
            address,
            document,
            ids: IdRegistry::new(),
            stats: DocumentStats::default(),
        }
    }
}

pub struct PassContext<'a> {
    pub outlines: &'a mut OutlineCache,
    pub options: &'a ProcessOptions,
}

/// A processing step. `collect` runs over every document of the batch before
/// `apply` runs over any of them.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Runs once per batch, before any document is touched.
    fn prepare(&mut self, _options: &ProcessOptions) -> Result<(), ProcessError> {
        Ok(())
    }

    fn collect(
        &mut self,
        _source: &mut SourceDocument,
        _cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        Ok(())
    }

    fn apply(
        &mut self,
        source: &mut SourceDocument,
        cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    Numbering,
    Identifiers,
    Toc,
    Xref,
}

impl PassKind {
    pub const ALL: [PassKind; 4] = [
        PassKind::Numbering,
        PassKind::Identifiers,
        PassKind::Toc,
        PassKind::Xref,
    ];
}

/// Gives every section of the outline an identifier.
#[derive(Debug, Default)]
pub struct IdentifierPass;

impl Pass for IdentifierPass {
    fn name(&self) -> &'static str {
        "identifiers"
    }

    fn apply(
        &mut self,
        source: &mut SourceDocument,
        cx: &mut PassContext<'_>,
    ) -> Result<(), ProcessError> {
        let outline = cx.outlines.outline(&source.document);
        let syntax =
            IdentifierSyntax::for_document(&source.document, cx.options.force_legacy_identifiers);
        for (id, _) in outline.depth_first() {
            ids::ensure_section_id(
                &mut source.document,
                &mut source.ids,
                outline.section(id),
                syntax,
            );
        }
        debug!(document = %source.label, ids = source.ids.len(), "assigned section identifiers");
        Ok(())
    }
}

pub fn build_passes(options: &ProcessOptions) -> Result<Vec<Box<dyn Pass>>> {
    build_passes_with(options, || {
        Ok(Box::new(HttpSourceLoader::new()?) as Box<dyn SourceLoader>)
    })
}

/// Like [`build_passes`], with the loader used for external term sources
/// supplied by the caller.
pub fn build_passes_with(
    options: &ProcessOptions,
    loader: impl FnOnce() -> Result<Box<dyn SourceLoader>>,
) -> Result<Vec<Box<dyn Pass>>> {
    let mut loader = Some(loader);
    let mut passes: Vec<Box<dyn Pass>> = Vec::new();
    for kind in PassKind::ALL {
        if !options.passes.contains(&kind) {
            continue;
        }
        let pass: Box<dyn Pass> = match kind {
            PassKind::Numbering => Box::new(NumberingPass::new()),
            PassKind::Identifiers => Box::new(IdentifierPass),
            PassKind::Toc => Box::new(TocPass::new()),
            PassKind::Xref => {
                let make_loader = loader
                    .take()
                    .ok_or_else(|| anyhow!("xref pass requested twice"))?;
                Box::new(XrefPass::new(make_loader()?)?)
            }
        };
        passes.push(pass);
    }
    Ok(passes)
}

/// Runs `passes` over the batch. Every pass is prepared before the first
/// document is mutated; the first error aborts the batch.
pub fn run_passes(
    sources: &mut [SourceDocument],
    options: &ProcessOptions,
    passes: &mut [Box<dyn Pass>],
) -> Result<(), ProcessError> {
    for pass in passes.iter_mut() {
        pass.prepare(options)?;
    }

    let mut outlines = OutlineCache::new();
    let mut cx = PassContext {
        outlines: &mut outlines,
        options,
    };
    for pass in passes.iter_mut() {
        info!(pass = pass.name(), documents = sources.len(), "running pass");
        for source in sources.iter_mut() {
            pass.collect(source, &mut cx)?;
        }
        for source in sources.iter_mut() {
            pass.apply(source, &mut cx)?;
        }
    }
    Ok(())
}

pub fn run_batch(sources: &mut [SourceDocument], options: &ProcessOptions) -> Result<()> {
    let mut passes = build_passes(options)?;
    run_passes(sources, options, &mut passes)?;
    Ok(())
}
