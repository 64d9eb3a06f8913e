//! DocumentStore (§4.J, §6 filesystem layout): atomic on-disk document I/O
//! and directory scanning, grounded on subx-cli's `core::fs_util` atomic
//! copy helper and `original_source/.../hash_registry.py`'s front-matter
//! scan, using `tokio::fs` for the async write-temp-then-rename discipline
//! spec.md §3 requires ("written to temp file, then rename").

use crate::domain::model::DocumentFrontMatter;
use crate::error::OrchestratorError;
use crate::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Owns the `documents/` directory: reads front matter for registry scans,
/// writes new reports atomically, and resolves the next version number for
/// a given source.
pub struct DocumentStore {
    documents_dir: PathBuf,
}

impl DocumentStore {
    /// Build a store rooted at `documents_dir`, creating it if absent.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Io`] if the directory cannot be created.
    pub fn new(documents_dir: impl Into<PathBuf>) -> Result<Self> {
        let documents_dir = documents_dir.into();
        std::fs::create_dir_all(&documents_dir)?;
        Ok(Self { documents_dir })
    }

    /// The directory this store manages.
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Scan every `.md` file directly under the documents directory,
    /// extracting front matter, tolerating per-file parse failures by
    /// logging and skipping them (§4.J `init`, §8 boundary behavior).
    pub fn scan_front_matter(&self) -> Result<Vec<(String, DocumentFrontMatter)>> {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&self.documents_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().to_string();
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("skipping {filename}: read failed: {e}");
                    continue;
                }
            };
            match parse_front_matter(&content) {
                Some(fm) => out.push((filename, fm)),
                None => log::warn!("skipping {filename}: front matter did not parse"),
            }
        }
        Ok(out)
    }

    /// Every `(filename, version)` pair already on disk for `source_identifier`.
    pub fn versions_for_source(&self, source_identifier: &str) -> Result<Vec<(String, u32)>> {
        let mut versions: Vec<(String, u32)> = self
            .scan_front_matter()?
            .into_iter()
            .filter(|(_, fm)| fm.source_identifier() == Some(source_identifier))
            .map(|(filename, fm)| (filename, fm.version))
            .collect();
        versions.sort_by_key(|(_, v)| *v);
        Ok(versions)
    }

    /// The version number the next write for `source_identifier` should use:
    /// one past the current maximum, or `1` if none exist yet.
    pub fn next_version(&self, source_identifier: &str) -> Result<u32> {
        let versions = self.versions_for_source(source_identifier)?;
        Ok(versions.iter().map(|(_, v)| *v).max().unwrap_or(0) + 1)
    }

    /// Atomically write `content` as `filename` under the documents
    /// directory: write to a sibling `.tmp` file, then rename into place
    /// (§3 "Documents are created atomically"; §8 "after a simulated crash
    /// between write-temp and rename, no `.md` file... is partially
    /// written").
    ///
    /// # Errors
    /// Returns [`OrchestratorError::Io`] on any filesystem failure.
    pub async fn write_atomic(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let final_path = self.documents_dir.join(filename);
        let tmp_path = self.documents_dir.join(format!("{filename}.tmp"));
        tokio::fs::write(&tmp_path, content.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(final_path)
    }

    /// Read the front matter of one on-disk document, tolerating a missing
    /// file by returning `Ok(None)` (§4.J "reads tolerate missing files").
    pub fn read_front_matter(&self, filename: &str) -> Result<Option<DocumentFrontMatter>> {
        let path = self.documents_dir.join(filename);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(parse_front_matter(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse a leading `---`-delimited YAML front-matter block.
///
/// Returns `None` (rather than erroring) on any malformed input, so callers
/// scanning a whole directory can skip one bad file without aborting (§4.J,
/// §8 boundary behavior).
pub fn parse_front_matter(content: &str) -> Option<DocumentFrontMatter> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    serde_yaml::from_str(yaml).ok()
}

/// The canonical `source_identifier` for a video URL: `https://<host>/watch?v=<11-char-id>`
/// after basic normalization (strips query params/fragments beyond `v`).
///
/// Grounded on `original_source`'s URL-normalization step that feeds
/// `generate_doc_hash`; §3 requires this exact canonical shape.
pub fn normalize_video_source_identifier(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| OrchestratorError::invalid_input(format!("not a valid URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| OrchestratorError::invalid_input("URL has no host"))?;
    let video_id = parsed
        .query_pairs()
        .find(|(k, _)| k == "v")
        .map(|(_, v)| v.to_string())
        .or_else(|| {
            // youtu.be/<id>-shaped short links carry the id as the path.
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| OrchestratorError::invalid_input("URL has no video id"))?;
    if video_id.len() != 11 {
        return Err(OrchestratorError::invalid_input(format!(
            "video id '{video_id}' is not 11 characters"
        )));
    }
    Ok(format!("https://{host}/watch?v={video_id}"))
}

/// The canonical `source_identifier` for an uploaded document: `<type>://<hash-of-content>`.
///
/// Hashes `content_bytes` directly rather than a lossily-decoded text
/// projection of them: `from_utf8_lossy` replaces invalid byte sequences
/// with U+FFFD, which would collapse distinct binary (PDF/Office) uploads
/// onto the same identifier (§3 `source_identifier`/`doc_hash`, invariant 6).
pub fn document_source_identifier(doc_type: &str, content_bytes: &[u8]) -> String {
    let digest = Sha256::digest(content_bytes);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{doc_type}://{hex}")
}

/// Infers the document type named in `source_identifier`'s `<type>://`
/// prefix from an uploaded file's name, per spec.md:213 ("Document type is
/// inferred from the filename extension").
pub fn infer_document_type(original_filename: &str) -> &'static str {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "md" | "markdown" => "md",
        "pdf" => "pdf",
        "doc" | "docx" => "docx",
        _ => "txt",
    }
}

/// Whether `doc_type` (as returned by [`infer_document_type`]) counts
/// against `max_binary_file_size` rather than `max_text_file_size` (§6
/// config table).
pub fn is_binary_document_type(doc_type: &str) -> bool {
    matches!(doc_type, "pdf" | "docx")
}
