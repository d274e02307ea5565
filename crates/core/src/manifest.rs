//! Input and output manifests

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// What the `--source` argument points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// Text file with one local path per line
    Txt,
    /// A single image file, uploaded on its own
    Image,
}

impl ManifestKind {
    pub fn as_str(&self) -> &str {
        match self {
            ManifestKind::Txt => "txt",
            ManifestKind::Image => "image",
        }
    }
}

/// Read manifest entries.
///
/// Trailing whitespace is stripped from every line. Blank lines are kept as
/// empty entries and fail path resolution like any other missing file.
pub fn read_manifest(source: &Path, kind: ManifestKind) -> Result<Vec<String>> {
    match kind {
        ManifestKind::Txt => {
            let content = fs::read_to_string(source).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::FileNotFound(source.to_path_buf()),
                _ => Error::Io(e),
            })?;
            Ok(parse_manifest(&content))
        }
        ManifestKind::Image => {
            let entry = source.to_str().ok_or_else(|| {
                Error::UnsupportedManifest(format!("non UTF-8 path: {}", source.display()))
            })?;
            Ok(vec![entry.to_string()])
        }
    }
}

/// Split manifest text into entries
pub fn parse_manifest(content: &str) -> Vec<String> {
    content.lines().map(|line| line.trim_end().to_string()).collect()
}

/// Write URLs one per line, replacing any existing file
pub fn write_url_list(path: &Path, urls: &[String]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for url in urls {
        writer.write_all(url.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
