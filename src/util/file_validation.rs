//! File validation and decoding for manuscript files
//!
//! Checks a file before it is opened (existence, size, binary content) and
//! decodes it with the configured encodings.

use std::fs;
use std::path::Path;

use encoding_rs::{Encoding, SHIFT_JIS};
use thiserror::Error;

/// Maximum file size in bytes (50 MB)
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Errors that can occur when opening a manuscript file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileOpenError {
    #[error("file not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("is a directory")]
    IsDirectory,
    /// Contains NUL bytes
    #[error("binary file")]
    BinaryFile,
    #[error("file too large ({size_mb:.1} MB)")]
    TooLarge { size_mb: f64 },
    /// None of the candidate encodings could decode the bytes
    #[error("cannot decode file (tried {tried})")]
    Undecodable { tried: String },
    #[error("{0}")]
    IoError(String),
}

/// Reject directories, missing files and anything over [`MAX_FILE_SIZE`]
pub fn validate_file_for_opening(path: &Path) -> Result<(), FileOpenError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FileOpenError::NotFound,
        std::io::ErrorKind::PermissionDenied => FileOpenError::PermissionDenied,
        _ => FileOpenError::IoError(e.to_string()),
    })?;

    if metadata.is_dir() {
        return Err(FileOpenError::IsDirectory);
    }

    if metadata.len() > MAX_FILE_SIZE {
        return Err(FileOpenError::TooLarge {
            size_mb: metadata.len() as f64 / (1024.0 * 1024.0),
        });
    }

    Ok(())
}

/// Text decoded from disk together with the encoding that worked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: String,
}

/// Look up an encoding by label. Windows code page names that the WHATWG
/// label set leaves out are mapped by hand.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim().to_ascii_lowercase().replace('_', "-");
    match label.as_str() {
        "cp932" | "ms932" | "sjis" | "shift-jis" | "windows-31j" => Some(SHIFT_JIS),
        other => Encoding::for_label(other.as_bytes()),
    }
}

/// Decode raw bytes, trying `candidates` in order.
///
/// A UTF-8 byte order mark is stripped and reported as `utf-8-sig`. Other
/// candidates must decode without a single malformed sequence; labels that
/// name no known encoding are skipped.
pub fn decode_text(bytes: &[u8], candidates: &[String]) -> Result<DecodedText, FileOpenError> {
    if bytes.contains(&0) {
        return Err(FileOpenError::BinaryFile);
    }

    let mut tried = Vec::new();
    for name in candidates {
        let label = name.trim().to_ascii_lowercase().replace('_', "-");
        let decoded = match label.as_str() {
            "utf-8" | "utf8" => bytes.strip_prefix(b"\xEF\xBB\xBF").map_or_else(
                || std::str::from_utf8(bytes).ok().map(|s| (s.to_string(), "utf-8".to_string())),
                |rest| {
                    std::str::from_utf8(rest)
                        .ok()
                        .map(|s| (s.to_string(), "utf-8-sig".to_string()))
                },
            ),
            "utf-8-sig" => {
                let rest = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(rest)
                    .ok()
                    .map(|s| (s.to_string(), "utf-8-sig".to_string()))
            }
            _ => match encoding_for_label(&label) {
                Some(encoding) => encoding
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|text| (text.into_owned(), label.clone())),
                None => {
                    tracing::debug!("skipping unknown encoding {}", name);
                    None
                }
            },
        };
        if let Some((text, encoding)) = decoded {
            return Ok(DecodedText { text, encoding });
        }
        tried.push(name.clone());
    }

    Err(FileOpenError::Undecodable {
        tried: tried.join(", "),
    })
}

/// Encode `text` for writing in `encoding`. `None` when the encoding is
/// unknown or some character has no representation in it.
pub fn encode_text(text: &str, encoding: &str) -> Option<Vec<u8>> {
    let label = encoding.trim().to_ascii_lowercase().replace('_', "-");
    match label.as_str() {
        "utf-8" | "utf8" => Some(text.as_bytes().to_vec()),
        "utf-8-sig" => {
            let mut bytes = b"\xEF\xBB\xBF".to_vec();
            bytes.extend_from_slice(text.as_bytes());
            Some(bytes)
        }
        _ => {
            let encoding = encoding_for_label(&label)?;
            // UTF-16 encoders fall back to UTF-8 output
            if encoding.output_encoding() != encoding {
                return None;
            }
            let (bytes, _, had_errors) = encoding.encode(text);
            (!had_errors).then(|| bytes.into_owned())
        }
    }
}

/// Read and decode a manuscript file
pub fn read_text_file(path: &Path, candidates: &[String]) -> Result<DecodedText, FileOpenError> {
    validate_file_for_opening(path)?;
    let bytes = fs::read(path).map_err(|e| FileOpenError::IoError(e.to_string()))?;
    decode_text(&bytes, candidates)
}

/// Tab title for a manuscript opened from `path`
pub fn filename_for_display(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
