//! Source file helpers for ingestion.

use std::fs;
use std::io::Read;
use std::path::Path;

/// Whether `path` looks like plain text that can be ingested directly.
///
/// Known binary formats (including PDF, which needs extraction first) are
/// rejected by extension; unknown extensions are sniffed for NUL bytes.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    if let Ok(file) = fs::File::open(path) {
        let mut buffer = [0u8; 512];
        let mut reader = std::io::BufReader::new(file);
        if let Ok(n) = reader.read(&mut buffer) {
            return !buffer[..n].contains(&0);
        }
    }

    false
}

/// Read a UTF-8 file, refusing anything larger than `max_size` bytes.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

/// Default document title for a source path: its file name.
pub fn title_from_path(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "pdf"
            | "doc"
            | "docx"
            | "xls"
            | "xlsx"
            | "ppt"
            | "pptx"
            | "odt"
            | "epub"
            | "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "webp"
            | "zip"
            | "tar"
            | "gz"
            | "7z"
            | "exe"
            | "so"
            | "dylib"
            | "bin"
    )
}

fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "txt" | "md" | "markdown" | "rst" | "adoc" | "org" | "csv" | "tsv" | "json" | "yaml"
            | "yml" | "toml" | "xml" | "html" | "htm" | "log"
    )
}
