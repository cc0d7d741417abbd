//! File classification and listing
//!
//! Decides whether an environment file is returned as an image, a base64
//! binary blob, or decoded text, and lists environment files for clients.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use walkdir::WalkDir;

/// Fallback MIME type for text documents
const DEFAULT_TEXT_MIME: &str = "text/plain";

/// Fallback MIME type for binary documents
const DEFAULT_BINARY_MIME: &str = "application/octet-stream";

/// Kind of a non-image document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Binary,
}

/// A text or binary file as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDocument {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub mime_type: String,
    /// Decoded text, or base64 for binary documents
    pub content: String,
}

/// Contents of an environment file, ready for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Image data, base64-encoded
    Image { mime_type: String, data: String },
    Document(FileDocument),
}

/// Guess a MIME type from the file extension, then from magic bytes
pub fn guess_mime(path: &Path, bytes: &[u8]) -> Option<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if let Some(mime) = ext.as_deref().and_then(mime_for_extension) {
        return Some(mime.to_string());
    }

    infer::get(bytes).map(|kind| kind.mime_type().to_string())
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        // Images
        "png" => "image/png",
        "jpg" | "jpeg" | "jpe" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "tif" | "tiff" => "image/tiff",
        // Text
        "txt" | "log" | "ini" | "cfg" => "text/plain",
        "py" | "pyi" => "text/x-python",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "xml" => "application/xml",
        "json" => "application/json",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",
        "sh" => "application/x-sh",
        // Binary
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "whl" => "application/zip",
        "npy" => "application/octet-stream",
        "parquet" => "application/vnd.apache.parquet",
        "pkl" | "pickle" => "application/octet-stream",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "wav" => "audio/x-wav",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}

/// Classify raw file bytes for transport
///
/// Images are recognized by MIME type alone. Anything else with a NUL byte
/// in the first `sniff_len` bytes is binary; the rest is text, decoded as
/// UTF-8 with a Latin-1 fallback.
pub fn classify(filename: &str, bytes: &[u8], mime: Option<String>, sniff_len: usize) -> FileContent {
    if let Some(ref m) = mime {
        if m.starts_with("image/") {
            return FileContent::Image {
                mime_type: m.clone(),
                data: STANDARD.encode(bytes),
            };
        }
    }

    let head = &bytes[..bytes.len().min(sniff_len)];
    if head.contains(&0) {
        return FileContent::Document(FileDocument {
            filename: filename.to_string(),
            kind: DocumentKind::Binary,
            mime_type: mime.unwrap_or_else(|| DEFAULT_BINARY_MIME.to_string()),
            content: STANDARD.encode(bytes),
        });
    }

    FileContent::Document(FileDocument {
        filename: filename.to_string(),
        kind: DocumentKind::Text,
        mime_type: mime.unwrap_or_else(|| DEFAULT_TEXT_MIME.to_string()),
        content: decode_text(bytes),
    })
}

/// UTF-8, or Latin-1 when the bytes are not valid UTF-8
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// List files under `root` as `/`-separated relative paths
///
/// Any path with a component named in `ignored_dirs` is skipped. Symlinks
/// to regular files are listed; symlinked directories are not descended.
/// Results are ordered by depth, then lexically.
pub fn list_relative_files(root: &Path, ignored_dirs: &[String]) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root).min_depth(1).into_iter().filter_entry(|entry| {
        !entry
            .file_name()
            .to_str()
            .is_some_and(|name| ignored_dirs.iter().any(|d| d == name))
    });

    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        let is_file = if entry.path_is_symlink() {
            entry.path().is_file()
        } else {
            entry.file_type().is_file()
        };
        if !is_file {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }

    files.sort_by(|a, b| {
        let depth_a = a.matches('/').count();
        let depth_b = b.matches('/').count();
        depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
    });
    Ok(files)
}
