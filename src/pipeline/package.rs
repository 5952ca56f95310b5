//! Output naming, atomic text writes and the download archive.
//!
//! Everything one run produces sits next to the requested output path:
//!
//! ```text
//! out/lecture.mp3             audio (.wav for the local engine)
//! out/lecture_summary.txt     transcript
//! out/lecture_timestamps.txt  section markers
//! out/lecture.zip             all of the above, flat
//! ```

use crate::error::Pdf2AudioError;
use crate::pipeline::speech::AudioFormat;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// `<name>` for the output files: the file stem of `output`.
pub fn output_stem(output: &Path) -> String {
    output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string())
}

/// Paths of every file a run may write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub audio: PathBuf,
    pub transcript: PathBuf,
    pub timestamps: PathBuf,
    pub archive: PathBuf,
}

impl OutputPaths {
    /// Derive all paths from the user's output path. Its extension is
    /// replaced by the one matching `format`.
    pub fn new(output: &Path, format: AudioFormat) -> Self {
        let dir = output.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = output_stem(output);
        Self {
            audio: dir.join(format!("{stem}.{}", format.extension())),
            transcript: dir.join(format!("{stem}_summary.txt")),
            timestamps: dir.join(format!("{stem}_timestamps.txt")),
            archive: dir.join(format!("{stem}.zip")),
        }
    }
}

/// Create the parent directory of `path` if it is missing.
pub async fn ensure_parent(path: &Path) -> Result<(), Pdf2AudioError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2AudioError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        _ => Ok(()),
    }
}

/// Write `contents` to `path` through a temp file and a rename, so readers
/// never see a half-written file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Pdf2AudioError> {
    ensure_parent(path).await?;

    let write_err = |e| Pdf2AudioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// Zip `files` (deflate) into memory under their base names.
///
/// Two inputs with the same base name would overwrite each other, so that
/// is an error.
pub fn build_archive(files: &[PathBuf]) -> Result<Vec<u8>, String> {
    let mut seen = HashSet::new();
    let mut buffer = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut buffer);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| format!("'{}' has no file name", file.display()))?;
        if !seen.insert(name.clone()) {
            return Err(format!("duplicate entry name '{name}'"));
        }

        let data = std::fs::read(file).map_err(|e| format!("reading '{}': {e}", file.display()))?;
        zip.start_file(name.as_str(), options)
            .map_err(|e| e.to_string())?;
        zip.write_all(&data).map_err(|e| e.to_string())?;
    }

    zip.finish().map_err(|e| e.to_string())?;
    Ok(buffer.into_inner())
}

/// Build the archive on the blocking pool and write it atomically.
///
/// Returns the archive size in bytes.
pub async fn write_archive(archive: &Path, files: &[PathBuf]) -> Result<u64, Pdf2AudioError> {
    let inputs = files.to_vec();
    let bytes = tokio::task::spawn_blocking(move || build_archive(&inputs))
        .await
        .map_err(|e| Pdf2AudioError::Internal(format!("Archive task panicked: {}", e)))?
        .map_err(|detail| Pdf2AudioError::Archive {
            path: archive.to_path_buf(),
            detail,
        })?;

    write_atomic(archive, &bytes).await?;
    info!("Archive written: {} ({} files)", archive.display(), files.len());
    Ok(bytes.len() as u64)
}
