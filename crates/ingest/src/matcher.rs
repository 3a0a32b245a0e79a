//! Surname-based linking of auxiliary documents to primary records.
//!
//! Each auxiliary kind lives in its own [`MatchPool`]; a successful
//! match consumes the file so no two records can claim it. When the
//! pools don't drain cleanly, [`reconcile`] decides whether the
//! leftovers can be force-linked or the run must fail.

use std::path::{Path, PathBuf};

use freightscan_core::Record;

use crate::util::similarity;

/// Minimum similarity for a fuzzy surname/token hit.
pub const FUZZY_THRESHOLD: f64 = 0.80;

/// Unconsumed auxiliary files of one kind, in archive order.
#[derive(Debug, Clone)]
pub struct MatchPool {
    files: Vec<PathBuf>,
}

impl MatchPool {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remove and return the first file matching any surname variant.
    ///
    /// Exact pass first: a lowercased variant appearing as a substring
    /// of the lowercased filename. Only when no file matches exactly
    /// does the fuzzy pass run, comparing variants against the
    /// filename's word tokens at [`FUZZY_THRESHOLD`].
    pub fn take(&mut self, variants: &[String]) -> Option<PathBuf> {
        if variants.is_empty() {
            return None;
        }
        let lowered: Vec<String> = variants.iter().map(|v| v.to_lowercase()).collect();

        let exact = self.files.iter().position(|path| {
            let fname = lower_name(path);
            lowered.iter().any(|v| fname.contains(v.as_str()))
        });
        if let Some(idx) = exact {
            let path = self.files.remove(idx);
            tracing::info!("exact surname match: {}", path.display());
            return Some(path);
        }

        let fuzzy = self.files.iter().position(|path| {
            let fname = lower_name(path);
            let words: Vec<&str> = word_tokens(&fname);
            lowered
                .iter()
                .any(|v| words.iter().any(|w| similarity(v, w) > FUZZY_THRESHOLD))
        });
        if let Some(idx) = fuzzy {
            let path = self.files.remove(idx);
            tracing::info!("fuzzy surname match: {}", path.display());
            return Some(path);
        }
        None
    }

    pub fn into_files(self) -> Vec<PathBuf> {
        self.files
    }
}

fn lower_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn word_tokens(s: &str) -> Vec<&str> {
    s.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Outcome of the post-matching audit.
#[derive(Debug)]
pub enum Reconciliation {
    /// Every record linked, both pools drained.
    Clean,
    /// Exactly one incomplete record and exactly one leftover file of
    /// each kind: safe to pair them up.
    ForceLink {
        record_idx: usize,
        invoice: PathBuf,
        note: PathBuf,
    },
    /// Leftover files that cannot be attributed to any record.
    Unresolved { diagnostic: String },
}

/// Audit records against the leftover pools.
///
/// Records missing a document but with empty pools are tolerated (the
/// errors stay on the record); leftover files are not, except for the
/// single 1:1:1 shape that force-linking can repair.
pub fn reconcile(records: &[Record], invoices: &MatchPool, notes: &MatchPool) -> Reconciliation {
    let incomplete: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_complete())
        .map(|(i, _)| i)
        .collect();

    if incomplete.len() == 1 && invoices.len() == 1 && notes.len() == 1 {
        return Reconciliation::ForceLink {
            record_idx: incomplete[0],
            invoice: invoices.files()[0].clone(),
            note: notes.files()[0].clone(),
        };
    }

    if invoices.is_empty() && notes.is_empty() {
        return Reconciliation::Clean;
    }

    Reconciliation::Unresolved {
        diagnostic: build_diagnostic(records, invoices, notes),
    }
}

fn build_diagnostic(records: &[Record], invoices: &MatchPool, notes: &MatchPool) -> String {
    let mut msg = String::new();
    if invoices.len() > 0 {
        msg.push_str(&format!("- Unmatched invoice (ESF) files: {}\n", invoices.len()));
    }
    if notes.len() > 0 {
        msg.push_str(&format!("- Unmatched shipping note (SNT) files: {}\n", notes.len()));
    }
    for (i, record) in records.iter().enumerate() {
        let invoice = if record.invoice_number.is_some() { "ok" } else { "missing invoice" };
        let note = if record.shipping_note_number.is_some() { "ok" } else { "missing note" };
        msg.push_str(&format!(
            "  record {} ({}): {invoice}, {note}\n",
            i + 1,
            record.driver_name,
        ));
    }
    let mut unused: Vec<String> = invoices
        .files()
        .iter()
        .chain(notes.files())
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(str::to_string)
        .collect();
    unused.sort();
    if !unused.is_empty() {
        msg.push_str("Unused files:\n");
        for name in unused {
            msg.push_str(&format!("  {name}\n"));
        }
    }
    msg
}
