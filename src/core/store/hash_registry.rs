//! HashRegistry (§4.J): an in-memory three-map index from content hash to
//! on-disk filenames, grounded directly on
//! `original_source/.../services/document/hash_registry.py`'s
//! `HashRegistry` (there a process-wide singleton; here an explicit,
//! dependency-injected struct per §9's anti-singleton decision).

use crate::domain::model::DocumentFrontMatter;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

/// Maps a document's content hash to its default (latest) filename, its full
/// version history, and the reverse filename-to-hash lookup.
#[derive(Debug, Default)]
pub struct HashRegistry {
    hash_to_filename: HashMap<String, String>,
    hash_to_versions: HashMap<String, Vec<String>>,
    filename_to_hash: HashMap<String, String>,
}

/// Derive the 8-hex-character content hash for a `source_identifier`, per
/// `original_source/.../youtube_summarizer/api.py::generate_doc_hash`
/// (there MD5-truncated; here SHA-256-truncated, an explicit substitution
/// recorded in the design ledger).
pub fn doc_hash(source_identifier: &str) -> String {
    let digest = Sha256::digest(source_identifier.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

impl HashRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `documents` front matter and group by `source_identifier`,
    /// tolerating per-file parse failures (logged and skipped), mirroring
    /// `init_mappings`'s two-pass grouping.
    pub fn init(&mut self, front_matters: &[(String, DocumentFrontMatter)]) {
        self.hash_to_filename.clear();
        self.hash_to_versions.clear();
        self.filename_to_hash.clear();

        let mut by_source: HashMap<String, Vec<(String, u32)>> = HashMap::new();
        for (filename, fm) in front_matters {
            if let Some(source_id) = fm.source_identifier() {
                by_source
                    .entry(source_id.to_string())
                    .or_default()
                    .push((filename.clone(), fm.version));
            } else {
                log::debug!("skipping {filename}: no source identifier in front matter");
            }
        }

        for (source_id, mut files) in by_source {
            let hash = doc_hash(&source_id);
            files.sort_by(|a, b| b.1.cmp(&a.1));
            let latest = files[0].0.clone();
            self.hash_to_filename.insert(hash.clone(), latest);
            self.hash_to_versions
                .insert(hash.clone(), files.iter().map(|(f, _)| f.clone()).collect());
            for (filename, _) in &files {
                self.filename_to_hash.insert(filename.clone(), hash.clone());
            }
        }
        log::info!(
            "hash registry initialized: {} distinct documents",
            self.hash_to_filename.len()
        );
    }

    /// Refresh the mapping for one `source_identifier` after a new version
    /// is written, without rescanning the whole directory (§4.J
    /// `refresh`), mirroring `refresh_mapping`.
    pub fn refresh(&mut self, source_identifier: &str, files: &[(String, u32)]) {
        if files.is_empty() {
            return;
        }
        let hash = doc_hash(source_identifier);
        let mut files = files.to_vec();
        files.sort_by(|a, b| b.1.cmp(&a.1));
        let latest = files[0].0.clone();
        self.hash_to_filename.insert(hash.clone(), latest);
        self.hash_to_versions
            .insert(hash.clone(), files.iter().map(|(f, _)| f.clone()).collect());
        for (filename, _) in &files {
            self.filename_to_hash.insert(filename.clone(), hash.clone());
        }
    }

    pub fn get_default(&self, hash: &str) -> Option<&str> {
        self.hash_to_filename.get(hash).map(String::as_str)
    }

    pub fn get_versions(&self, hash: &str) -> &[String] {
        self.hash_to_versions.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_hash(&self, filename: &str) -> Option<&str> {
        self.filename_to_hash.get(filename).map(String::as_str)
    }
}

/// Resolve a `doc_hash` against a `documents_dir`, independent of any
/// registry state, for cold lookups (e.g. CLI `show`).
pub fn resolve_existing(documents_dir: &Path, hash: &str, registry: &HashRegistry) -> Option<std::path::PathBuf> {
    registry.get_default(hash).map(|name| documents_dir.join(name))
}
