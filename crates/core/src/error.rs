use thiserror::Error;

/// Failures that abort an entire archive run. Everything milder is recorded
/// per record (`Record::errors`) or degrades to an empty field value.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(
        "no primary documents found in the archive (expected e.g. '1.pdf' or '1.xlsx'); \
         check the archive structure"
    )]
    NoPrimaryDocuments,

    /// Leftover invoice/shipping-note files that reconciliation could not
    /// absorb. The diagnostic lists every record's match status and every
    /// unused file.
    #[error("document count mismatch after matching:\n{diagnostic}")]
    UnresolvedDocuments { diagnostic: String },

    #[error("archive could not be read: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
