//! Identifier and path allocation
//!
//! Every document and resource of a book receives a manifest id and an internal
//! path from a single [Allocator] owned by the book. Ids are derived from a
//! per-kind counter, so the same sequence of calls always yields the same
//! names, and no two allocations ever share an id or a path.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use log::debug;

use crate::{
    error::{ConfigurationError, EpubError},
    types::ItemKind,
    utils::is_xml_name,
};

/// Result of a single allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub id: String,

    /// Path relative to the content root, `/` separated
    pub path: String,
}

#[derive(Debug, Default)]
pub(crate) struct Allocator {
    counters: HashMap<ItemKind, usize>,

    /// Allocated ids, in allocation order
    ids: IndexSet<String>,
    paths: HashSet<String>,
    frozen: bool,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and a path for a new item
    ///
    /// ## Parameters
    /// - `kind`: The kind of the item, selects the id prefix and the folder
    /// - `filename`: Optional caller-chosen file name, must be a single path component
    /// - `extension`: Extension appended to generated file names
    ///
    /// ## Return
    /// - `Ok(Allocation)`: The allocated id and path
    /// - `Err(EpubError)`: The table is frozen, the filename is invalid or already taken
    pub fn allocate(
        &mut self,
        kind: ItemKind,
        filename: Option<&str>,
        extension: Option<&str>,
    ) -> Result<Allocation, EpubError> {
        if self.frozen {
            return Err(ConfigurationError::AllocationAfterFinalize.into());
        }

        if let Some((id, path)) = kind.fixed_name() {
            return self.claim(id.to_string(), path.to_string());
        }

        if let Some(filename) = filename {
            Self::validate_filename(filename)?;
        }

        let counter = self.counters.entry(kind).or_insert(0);
        loop {
            *counter += 1;

            let id = if kind == ItemKind::Cover && *counter == 1 {
                kind.prefix().to_string()
            } else {
                format!("{}{:04}", kind.prefix(), counter)
            };
            if self.ids.contains(&id) {
                continue;
            }

            let file_name = match (filename, extension) {
                (Some(filename), _) => filename.to_string(),
                (None, Some(ext)) => format!("{}.{}", id, ext),
                (None, None) => id.clone(),
            };
            let path = Self::join(kind.folder(), &file_name);

            if filename.is_none() && self.paths.contains(&path) {
                // a caller already claimed the generated name, try the next counter value
                continue;
            }

            return self.claim(id, path);
        }
    }

    /// Stop handing out new allocations
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Position of `id` in the allocation order, `None` for unknown ids
    pub fn sequence(&self, id: &str) -> Option<usize> {
        self.ids.get_index_of(id)
    }

    fn claim(&mut self, id: String, path: String) -> Result<Allocation, EpubError> {
        if !is_xml_name(&id) {
            return Err(ConfigurationError::InvalidFilename { filename: id }.into());
        }
        if self.ids.contains(&id) {
            return Err(ConfigurationError::DuplicateId { id }.into());
        }
        if self.paths.contains(&path) {
            return Err(ConfigurationError::DuplicateFilename { path }.into());
        }

        debug!("allocated '{}' at '{}'", id, path);

        self.ids.insert(id.clone());
        self.paths.insert(path.clone());
        Ok(Allocation { id, path })
    }

    /// Filenames are written verbatim into hrefs, so they are limited to the
    /// unreserved URL characters: ASCII letters, digits, `-`, `.`, `_` and `~`
    fn validate_filename(filename: &str) -> Result<(), EpubError> {
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || !filename
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '_' | '~'))
        {
            return Err(ConfigurationError::InvalidFilename {
                filename: filename.to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn join(folder: &str, file_name: &str) -> String {
        if folder.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", folder, file_name)
        }
    }
}
