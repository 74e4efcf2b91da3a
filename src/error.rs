use thiserror::Error;

/// Fatal conditions raised by the processing passes.
///
/// Unresolved terms and unnumbered sections are not represented here: they
/// reflect authoring choices and leave the document untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("{document}: required marker `{marker}` is unusable: {detail}")]
    StructuralPrecondition {
        document: String,
        marker: String,
        detail: String,
    },
    #[error("{document}: the term \"{term}\" is defined more than once")]
    DuplicateDefinition { document: String, term: String },
    #[error("{document}: table of contents entry text \"{found}\" diverges from header text \"{expected}\"")]
    InconsistentAnchor {
        document: String,
        expected: String,
        found: String,
    },
    #[error("failed to load external source {address}: {reason}")]
    ExternalSource { address: String, reason: String },
}

impl ProcessError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::StructuralPrecondition { .. } => "structural-precondition",
            ProcessError::DuplicateDefinition { .. } => "duplicate-definition",
            ProcessError::InconsistentAnchor { .. } => "inconsistent-anchor",
            ProcessError::ExternalSource { .. } => "external-source",
        }
    }
}
