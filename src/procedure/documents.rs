//! Document filename resolution
//!
//! Derives a file-system-safe, collision-free local filename for each
//! document attached to a procedure.

use crate::procedure::{DocumentRef, RawDocument};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

/// `Name (pdf)` -> name and extension
static LABEL_WITH_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.*?)\s*\((?P<ext>[A-Za-z0-9]+)\)\s*$").expect("valid regex")
});

/// `Notice (notice_2023.docx)` -> the filename inside the parentheses
static PARENTHESIZED_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?P<file>[^()]+\.[^()]+)\)").expect("valid regex"));

const FALLBACK_NAME: &str = "document";

/// Resolves local destinations for a procedure's documents
///
/// Documents are processed in the order given. When a filename was already
/// handed out earlier in the same procedure, `_<n>` is inserted before the
/// extension, `n` being the number of earlier documents with that name.
///
/// A file already present at a destination (from an earlier run) is logged
/// and will be overwritten by the download.
///
/// # Arguments
///
/// * `procedure_dir` - Folder of this procedure
/// * `documents` - Raw document links in page order
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use tender_harvest::procedure::{resolve_documents, RawDocument};
///
/// let docs = vec![
///     RawDocument { label: "Notice (pdf)".into(), url: "https://example.com/1".into() },
///     RawDocument { label: "Notice (pdf)".into(), url: "https://example.com/2".into() },
/// ];
/// let refs = resolve_documents(Path::new("procedures/42"), &docs);
/// assert_eq!(refs[0].path, Path::new("procedures/42/Notice.pdf"));
/// assert_eq!(refs[1].path, Path::new("procedures/42/Notice_1.pdf"));
/// ```
pub fn resolve_documents(procedure_dir: &Path, documents: &[RawDocument]) -> Vec<DocumentRef> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut assigned: HashSet<String> = HashSet::new();
    let mut refs = Vec::with_capacity(documents.len());

    for document in documents {
        let candidate = filename_from_label(&document.label);
        let prior = seen.get(&candidate).copied().unwrap_or(0);

        let filename = if prior == 0 && !assigned.contains(&candidate) {
            candidate.clone()
        } else {
            let mut n = prior.max(1);
            loop {
                let suffixed = with_suffix(&candidate, n);
                if !assigned.contains(&suffixed) {
                    break suffixed;
                }
                n += 1;
            }
        };

        *seen.entry(candidate).or_insert(0) += 1;
        assigned.insert(filename.clone());

        let path = procedure_dir.join(&filename);
        if path.exists() {
            tracing::warn!(
                "File {} already exists and will be downloaded again",
                path.display()
            );
        }

        refs.push(DocumentRef {
            url: document.url.clone(),
            path,
        });
    }

    refs
}

/// Derives a sanitized filename from a document label
///
/// - `Protocol (pdf)` becomes `Protocol.pdf`
/// - `Notice (notice.docx)` becomes `notice.docx`
/// - anything else is kept verbatim
pub fn filename_from_label(label: &str) -> String {
    let label = label.trim();

    let raw = if let Some(caps) = LABEL_WITH_EXTENSION.captures(label) {
        let name = caps["name"].trim();
        let name = if name.is_empty() { FALLBACK_NAME } else { name };
        format!("{}.{}", name, &caps["ext"])
    } else if let Some(caps) = PARENTHESIZED_FILENAME.captures(label) {
        caps["file"].trim().to_string()
    } else {
        label.to_string()
    };

    sanitize_filename(&raw)
}

/// Strips characters that are illegal in file names: `< > : " / \ | ? *`
///
/// Control characters are dropped as well. An empty result becomes
/// `document`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Inserts `_<n>` before the extension: `name.ext` -> `name_<n>.ext`
fn with_suffix(filename: &str, n: usize) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", filename, n),
    }
}
