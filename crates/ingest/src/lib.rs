pub mod archive;
pub mod classifier;
pub mod cleaner;
pub mod matcher;
pub mod pipeline;
pub mod sheet;
pub mod surname;
pub(crate) mod util;

pub use archive::WorkDirs;
pub use classifier::{classify, classify_name, ClassifiedFiles, DocKind};
pub use matcher::{reconcile, MatchPool, Reconciliation, FUZZY_THRESHOLD};
pub use pipeline::{link_documents, Pipeline, RunConfig};
pub use surname::surname_variants;
