//! Page extraction: cut a standalone PDF out of a source document.
//!
//! Each chunk is sent to the backend as a complete, minimal PDF holding only
//! its pages. The source is parsed once per run and shared read-only by all
//! chunk pipelines. Every extraction works on its own clone: the root page
//! tree node is pointed at the range's pages alone (which carry their
//! inherited attributes along), objects nothing references anymore are
//! pruned, and the result is serialised to memory. One pass over the
//! object table per chunk, whatever the page count. Nothing is written to disk, and the
//! payload buffer is released as soon as the chunk pipeline drops it.

use crate::error::Pdf2TxtError;
use crate::plan::PageRange;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lopdf::{Document, Object, ObjectId};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A parsed PDF, immutable for the duration of a run.
pub struct SourceDocument {
    name: String,
    path: PathBuf,
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("page_count", &self.page_ids.len())
            .finish()
    }
}

/// The sub-document for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    pub range: PageRange,
    /// A complete PDF file holding exactly the pages of `range`.
    pub bytes: Vec<u8>,
}

impl ChunkPayload {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl SourceDocument {
    /// Read and parse a PDF from disk. Blocking.
    pub fn open(path: &Path) -> Result<Self, Pdf2TxtError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Pdf2TxtError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Pdf2TxtError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Pdf2TxtError::DocumentOpen {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::load(name, path.to_path_buf(), &bytes)
    }

    /// Parse a PDF held in memory. `name` labels it in logs and errors.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, Pdf2TxtError> {
        let name = name.into();
        let path = PathBuf::from(&name);
        Self::load(name, path, bytes)
    }

    fn load(name: String, path: PathBuf, bytes: &[u8]) -> Result<Self, Pdf2TxtError> {
        if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&bytes[..4]);
            return Err(Pdf2TxtError::NotAPdf { path, magic });
        }

        let mut document = Document::load_mem(bytes).map_err(|e| Pdf2TxtError::DocumentOpen {
            path: path.clone(),
            detail: e.to_string(),
        })?;

        // Empty user passwords are common on "protected" PDFs that open
        // without prompting; anything else cannot be split.
        if document.is_encrypted() {
            document
                .decrypt("")
                .map_err(|_| Pdf2TxtError::Encrypted { path: path.clone() })?;
            debug!("Decrypted {} with empty password", name);
        }

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        info!("Opened {}: {} pages", name, page_ids.len());

        Ok(Self {
            name,
            path,
            document,
            page_ids,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn pdf_version(&self) -> &str {
        &self.document.version
    }

    /// Fail with [`Pdf2TxtError::OutOfRange`] unless `range` is a non-empty
    /// range inside the document.
    pub fn check_range(&self, range: PageRange) -> Result<(), Pdf2TxtError> {
        if range.is_empty() || range.end > self.page_count() {
            return Err(Pdf2TxtError::OutOfRange {
                range,
                total: self.page_count(),
            });
        }
        Ok(())
    }

    /// Build the standalone sub-document for `range`. Blocking.
    pub fn extract(&self, range: PageRange) -> Result<ChunkPayload, Pdf2TxtError> {
        self.check_range(range)?;

        let fail = |e: lopdf::Error| {
            Pdf2TxtError::Internal(format!("building sub-document for pages {range}: {e}"))
        };
        let kept = &self.page_ids[range.start..range.end];

        let mut chunk = self.document.clone();
        let root = chunk
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(fail)?;

        // Kept pages hang directly off the root, so attributes they used to
        // inherit from intermediate nodes are copied onto the page itself.
        for &page_id in kept {
            let inherited: Vec<(&[u8], Object)> = INHERITABLE
                .iter()
                .filter_map(|&key| self.inherited(page_id, key).map(|value| (key, value)))
                .collect();
            let page = chunk.get_dictionary_mut(page_id).map_err(fail)?;
            for (key, value) in inherited {
                page.set(key, value);
            }
            page.set("Parent", root);
        }

        let root_node = chunk.get_dictionary_mut(root).map_err(fail)?;
        root_node.set(
            "Kids",
            kept.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
        );
        root_node.set("Count", range.len() as i64);
        chunk.prune_objects();

        let mut bytes = Vec::new();
        chunk
            .save_to(&mut bytes)
            .map_err(|e| Pdf2TxtError::Internal(format!("serialising pages {range}: {e}")))?;

        debug!(
            "{}: pages {} → {} byte sub-document",
            self.name,
            range,
            bytes.len()
        );
        Ok(ChunkPayload { range, bytes })
    }

    /// Value of `key` on the page or the nearest page tree ancestor.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut node = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.document.get_dictionary(parent).ok()?;
        }
        None
    }
}

/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Bound on parent links followed, so a cyclic page tree cannot hang.
const MAX_TREE_DEPTH: usize = 64;

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A PDF whose page `i` draws the text `Page i`.
    pub fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for i in 0..pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {i}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}
