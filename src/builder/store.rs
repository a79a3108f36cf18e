//! Resource Store
//!
//! Holds every embedded resource of a book until export. Inline bytes are
//! owned by the store from the moment they are added; resources added from a
//! path are read when the book is finalized.

use std::fs;

use indexmap::IndexMap;
use infer::Infer;
use log::debug;

use crate::{
    builder::allocator::Allocator,
    error::{EpubError, ResourceError},
    types::{ItemKind, ResourceHandle, ResourceSource},
    utils::{content_digest, extension_from_mime, file_extension, mime_from_extension, refine_mime_type},
};

#[derive(Debug)]
pub(crate) struct StoredResource {
    pub handle: ResourceHandle,
    pub source: ResourceSource,

    /// Media type declared by the caller, stored verbatim
    pub media_type: Option<String>,
}

/// A resource whose bytes and media type are known
#[derive(Debug, Clone)]
pub(crate) struct LoadedResource {
    pub kind: ItemKind,
    pub id: String,
    pub path: String,
    pub mime: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct ResourceStore {
    /// Resources keyed by the identity of their source, in allocation order
    items: IndexMap<String, StoredResource>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the store
    ///
    /// Adding a source that is already stored under the same kind returns
    /// the handle of the stored resource instead of allocating a new one.
    ///
    /// ## Parameters
    /// - `allocator`: The allocation table of the book
    /// - `kind`: Kind of the resource
    /// - `source`: Inline bytes or a path to read at finalize
    /// - `filename`: Optional internal file name
    /// - `media_type`: Optional declared media type, inferred when absent
    pub fn add(
        &mut self,
        allocator: &mut Allocator,
        kind: ItemKind,
        source: ResourceSource,
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        if let Some(media_type) = media_type {
            if media_type.trim().is_empty() {
                return Err(ResourceError::EmptyMediaType {
                    filename: filename
                        .map(str::to_string)
                        .unwrap_or_else(|| Self::describe(&source)),
                }
                .into());
            }
        }

        let identity = Self::identity(kind, &source);
        if let Some(stored) = self.items.get(&identity) {
            debug!("resource '{}' already stored, reusing it", stored.handle.id);
            return Ok(stored.handle.clone());
        }

        let extension = Self::extension(kind, &source, filename, media_type);
        let allocation = allocator.allocate(kind, filename, extension.as_deref())?;

        let handle = ResourceHandle {
            id: allocation.id,
            path: allocation.path,
            kind,
        };
        self.items.insert(
            identity,
            StoredResource {
                handle: handle.clone(),
                source,
                media_type: media_type.map(str::to_string),
            },
        );

        Ok(handle)
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.items
            .values()
            .any(|stored| stored.handle == *handle)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Read every resource and resolve its media type
    ///
    /// The first source that can not be read aborts the whole operation,
    /// the returned error names the resource it belongs to.
    pub fn load(&self) -> Result<Vec<LoadedResource>, EpubError> {
        let infer = Infer::new();

        self.items
            .values()
            .map(|stored| -> Result<LoadedResource, EpubError> {
                let handle = &stored.handle;
                let data = match &stored.source {
                    ResourceSource::Bytes(bytes) => bytes.clone(),
                    ResourceSource::Path(path) => {
                        fs::read(path).map_err(|err| ResourceError::UnreadableSource {
                            id: handle.id.clone(),
                            source_path: path.to_string_lossy().to_string(),
                            reason: err.to_string(),
                        })?
                    }
                };

                let mime = match &stored.media_type {
                    Some(media_type) => media_type.clone(),
                    None => Self::infer_media_type(&infer, &handle.path, &data)
                        .ok_or_else(|| ResourceError::UnknownMediaType { id: handle.id.clone() })?,
                };

                Ok(LoadedResource {
                    kind: handle.kind,
                    id: handle.id.clone(),
                    path: handle.path.clone(),
                    mime,
                    data,
                })
            })
            .collect()
    }

    fn infer_media_type(infer: &Infer, path: &str, data: &[u8]) -> Option<String> {
        let extension = file_extension(path).unwrap_or_default();

        match infer.get(data) {
            Some(infer_mime) => Some(refine_mime_type(infer_mime.mime_type(), &extension)),
            None => mime_from_extension(&extension).map(str::to_string),
        }
    }

    fn identity(kind: ItemKind, source: &ResourceSource) -> String {
        match source {
            ResourceSource::Bytes(bytes) => format!("{:?}:sha1:{}", kind, content_digest(bytes)),
            ResourceSource::Path(path) => format!("{:?}:path:{}", kind, path.to_string_lossy()),
        }
    }

    /// Extension of the internal file, taken from the first of: the caller's
    /// filename, the source path, the declared media type, the sniffed content
    fn extension(
        kind: ItemKind,
        source: &ResourceSource,
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Option<String> {
        filename
            .and_then(file_extension)
            .or_else(|| match source {
                ResourceSource::Path(path) => file_extension(&path.to_string_lossy()),
                ResourceSource::Bytes(_) => None,
            })
            .or_else(|| media_type.and_then(extension_from_mime).map(str::to_string))
            .or_else(|| match source {
                ResourceSource::Bytes(bytes) => {
                    infer::get(bytes).map(|sniffed| sniffed.extension().to_string())
                }
                ResourceSource::Path(_) => None,
            })
            .or_else(|| (kind == ItemKind::Stylesheet).then(|| "css".to_string()))
    }

    fn describe(source: &ResourceSource) -> String {
        match source {
            ResourceSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ResourceSource::Path(path) => path.to_string_lossy().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use crate::{
        builder::{allocator::Allocator, store::ResourceStore},
        error::{EpubError, ResourceError},
        types::{ItemKind, ResourceSource},
    };

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_add_allocates_unique_entries() {
        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();

        let first = store
            .add(&mut allocator, ItemKind::Stylesheet, b"p {}".as_slice().into(), None, None)
            .unwrap();
        let second = store
            .add(&mut allocator, ItemKind::Stylesheet, b"h1 {}".as_slice().into(), None, Some("text/css"))
            .unwrap();

        assert_eq!(first.path, "css/css0001.css");
        assert_ne!(first.id, second.id);
        assert_ne!(first.path, second.path);
        assert_eq!(second.path, "css/css0002.css");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_add_deduplicates_same_source() {
        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();

        let first = store
            .add(&mut allocator, ItemKind::Image, PNG_HEADER.into(), None, None)
            .unwrap();
        let again = store
            .add(&mut allocator, ItemKind::Image, PNG_HEADER.to_vec().into(), Some("other.png"), None)
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(first.path, "images/image0001.png");
        assert_eq!(store.len(), 1);

        let path_source = ResourceSource::Path(PathBuf::from("/nonexistent/a.png"));
        let by_path = store
            .add(&mut allocator, ItemKind::Image, path_source.clone(), None, None)
            .unwrap();
        let by_path_again = store
            .add(&mut allocator, ItemKind::Image, path_source, None, None)
            .unwrap();
        assert_eq!(by_path, by_path_again);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_add_empty_media_type() {
        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();

        let result = store.add(
            &mut allocator,
            ItemKind::Font,
            b"data".as_slice().into(),
            Some("font.ttf"),
            Some(" "),
        );
        assert_eq!(
            result.unwrap_err(),
            EpubError::from(ResourceError::EmptyMediaType { filename: "font.ttf".to_string() })
        );
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_load_resolves_media_types() {
        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();

        store
            .add(&mut allocator, ItemKind::Image, PNG_HEADER.into(), None, None)
            .unwrap();
        store
            .add(&mut allocator, ItemKind::Stylesheet, b"body {}".as_slice().into(), Some("main.css"), None)
            .unwrap();
        store
            .add(&mut allocator, ItemKind::Font, b"not a font".as_slice().into(), None, Some("font/otf"))
            .unwrap();

        let loaded = store.load().unwrap();
        let mimes = loaded.iter().map(|item| item.mime.as_str()).collect::<Vec<_>>();
        assert_eq!(mimes, vec!["image/png", "text/css", "font/otf"]);
        assert_eq!(loaded[1].path, "css/main.css");
        assert_eq!(loaded[2].path, "fonts/font0001.otf");
    }

    #[test]
    fn test_load_reads_path_sources() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("style.css");
        fs::write(&source, "em { font-style: italic; }").unwrap();

        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();
        let handle = store
            .add(&mut allocator, ItemKind::Stylesheet, source.clone().into(), None, None)
            .unwrap();
        assert_eq!(handle.path, "css/css0001.css");

        let loaded = store.load().unwrap();
        assert_eq!(loaded[0].data, b"em { font-style: italic; }");
        assert_eq!(loaded[0].mime, "text/css");
    }

    #[test]
    fn test_load_missing_path_names_resource() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");

        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();
        store
            .add(&mut allocator, ItemKind::Image, missing.into(), None, None)
            .unwrap();

        match store.load() {
            Err(EpubError::ResourceError {
                source: ResourceError::UnreadableSource { id, source_path, .. },
            }) => {
                assert_eq!(id, "image0001");
                assert!(source_path.ends_with("missing.png"));
            }
            other => panic!("unexpected result: {:?}", other.map(|items| items.len())),
        }
    }

    #[test]
    fn test_load_unknown_media_type() {
        let mut allocator = Allocator::new();
        let mut store = ResourceStore::new();
        store
            .add(&mut allocator, ItemKind::Font, b"opaque".as_slice().into(), None, None)
            .unwrap();

        assert_eq!(
            store.load().unwrap_err(),
            EpubError::from(ResourceError::UnknownMediaType { id: "font0001".to_string() })
        );
    }
}
