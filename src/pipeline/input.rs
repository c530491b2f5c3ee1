//! Input resolution: turn the user-supplied path into the list of PDFs to
//! process, and map each one to its output file.
//!
//! A directory is scanned non-recursively; files whose extension is `pdf`
//! in any case are taken, in sorted order so runs over the same directory
//! report documents in the same order. Content is not checked here: a
//! `.pdf` that is not a PDF fails later, on its own, with
//! [`Pdf2TxtError::NotAPdf`].

use crate::error::Pdf2TxtError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Expand `input` (a PDF file or a directory) into PDF paths.
///
/// An existing directory without PDFs yields an empty list.
pub fn resolve_inputs(input: &Path) -> Result<Vec<PathBuf>, Pdf2TxtError> {
    let meta = std::fs::metadata(input).map_err(|e| io_error(input, e))?;

    if meta.is_file() {
        if !has_pdf_extension(input) {
            return Err(Pdf2TxtError::InvalidInput {
                path: input.to_path_buf(),
            });
        }
        debug!("Resolved single PDF: {}", input.display());
        return Ok(vec![input.to_path_buf()]);
    }

    if !meta.is_dir() {
        return Err(Pdf2TxtError::InvalidInput {
            path: input.to_path_buf(),
        });
    }

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(input).map_err(|e| io_error(input, e))? {
        let entry = entry.map_err(|e| io_error(input, e))?;
        let path = entry.path();
        if path.is_file() && has_pdf_extension(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort();

    if pdfs.is_empty() {
        warn!("No PDF files found in {}", input.display());
    } else {
        debug!("Found {} PDFs in {}", pdfs.len(), input.display());
    }
    Ok(pdfs)
}

/// `<output_dir>/<stem>.txt` for `input`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    output_dir.join(format!("{stem}.txt"))
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn io_error(path: &Path, e: std::io::Error) -> Pdf2TxtError {
    match e.kind() {
        std::io::ErrorKind::NotFound => Pdf2TxtError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => Pdf2TxtError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2TxtError::InvalidInput {
            path: path.to_path_buf(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, b"%PDF-1.5").unwrap();
        p
    }

    #[test]
    fn directory_scan_is_sorted_and_case_insensitive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.pdf");
        touch(dir.path(), "A.PDF");
        touch(dir.path(), "notes.txt");
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();
        touch(&dir.path().join("nested.pdf"), "inner.pdf");

        let found = resolve_inputs(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
    }

    #[test]
    fn single_file_is_returned_as_is() {
        let dir = TempDir::new().unwrap();
        let p = touch(dir.path(), "report.pdf");
        assert_eq!(resolve_inputs(&p).unwrap(), vec![p]);
    }

    #[test]
    fn non_pdf_file_is_invalid_input() {
        let dir = TempDir::new().unwrap();
        let p = touch(dir.path(), "report.docx");
        assert!(matches!(
            resolve_inputs(&p).unwrap_err(),
            Pdf2TxtError::InvalidInput { .. }
        ));
    }

    #[test]
    fn missing_path_is_not_found() {
        assert!(matches!(
            resolve_inputs(Path::new("/no/such/dir")).unwrap_err(),
            Pdf2TxtError::FileNotFound { .. }
        ));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(resolve_inputs(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn output_path_uses_stem() {
        assert_eq!(
            output_path_for(Path::new("/in/Annual Report.pdf"), Path::new("out")),
            PathBuf::from("out/Annual Report.txt")
        );
        assert_eq!(
            output_path_for(Path::new("/in/scan.v2.PDF"), Path::new("out")),
            PathBuf::from("out/scan.v2.txt")
        );
    }
}
