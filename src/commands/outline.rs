use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::OutlineArgs;
use crate::dom::Document;
use crate::dom::markup::MarkupReader;
use crate::model::{OutlineEntry, OutlineReport};
use crate::outline::{self, Outline};
use crate::util::{now_utc_string, write_json_pretty};
use crate::vocab::{self, SECNO_CLASS};

pub fn run(args: OutlineArgs) -> Result<()> {
    let report = build_report(&args.file)?;
    info!(
        path = %args.file.display(),
        sections = report.section_count,
        "built outline"
    );

    match &args.output {
        Some(path) => {
            write_json_pretty(path, &report)?;
            info!(path = %path.display(), "wrote outline report");
        }
        None => {
            let mut output = io::BufWriter::new(io::stdout().lock());
            serde_json::to_writer_pretty(&mut output, &report)
                .context("failed to serialize outline json output")?;
            writeln!(output)?;
            output.flush()?;
        }
    }
    Ok(())
}

pub fn build_report(path: &Path) -> Result<OutlineReport> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let doc = MarkupReader::new()?.parse(&text);
    let outline = Outline::build(&doc);
    let sections: Vec<OutlineEntry> = outline
        .depth_first()
        .into_iter()
        .map(|(id, depth)| entry(&doc, &outline, id, depth))
        .collect();

    Ok(OutlineReport {
        source_path: path.display().to_string(),
        generated_at: now_utc_string(),
        section_count: sections.len(),
        sections,
    })
}

fn entry(doc: &Document, outline: &Outline, id: outline::SectionId, depth: usize) -> OutlineEntry {
    let section = outline.section(id);
    let header = section.header();
    let header_text = section.header_text_element(doc).map(|text| {
        vocab::collapse_spaces(
            &doc.text_content_skipping(text, &|doc, node| doc.has_class(node, SECNO_CLASS)),
        )
    });
    OutlineEntry {
        depth,
        element: doc.name(section.element()).to_string(),
        id: doc.attr(section.element(), "id").map(str::to_string),
        header_element: header.map(|header| doc.name(header).to_string()),
        rank: header.map(|header| outline::rank(doc, header)),
        header_text,
    }
}
