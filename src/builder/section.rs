//! Section tree
//!
//! Sections own their children by value. The table of contents, the spine and
//! the flattened NCX list are all produced from [SectionTree::reading_order],
//! the one pre-order walk of the tree.

use std::path::Path;

use crate::{
    error::{ConfigurationError, EpubError},
    types::{SectionHandle, TocEntry},
};

#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub id: String,
    pub path: String,
    pub title: Option<String>,
    pub body: String,

    /// Paths of linked stylesheets, relative to the content root
    pub stylesheets: Vec<String>,

    pub children: Vec<Section>,
}

impl Section {
    /// Label shown in the navigation documents
    ///
    /// Untitled sections fall back to the stem of their file name.
    pub fn label(&self) -> String {
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => Path::new(&self.path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| self.id.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SectionTree {
    roots: Vec<Section>,
}

impl SectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section as the last child of `parent`, or as a new top-level section
    pub fn insert(
        &mut self,
        parent: Option<&SectionHandle>,
        section: Section,
    ) -> Result<SectionHandle, EpubError> {
        let id = section.id.clone();

        let (siblings, mut position) = match parent {
            Some(handle) => {
                let parent_section = self.get_mut(handle)?;
                (&mut parent_section.children, handle.position.clone())
            }
            None => (&mut self.roots, vec![]),
        };

        siblings.push(section);
        position.push(siblings.len() - 1);

        Ok(SectionHandle { id, position })
    }

    pub fn get(&self, handle: &SectionHandle) -> Option<&Section> {
        let (first, rest) = handle.position.split_first()?;

        let mut current = self.roots.get(*first)?;
        for index in rest {
            current = current.children.get(*index)?;
        }

        (current.id == handle.id).then_some(current)
    }

    fn get_mut(&mut self, handle: &SectionHandle) -> Result<&mut Section, EpubError> {
        let unknown = || ConfigurationError::UnknownSection { id: handle.id.clone() };

        let (first, rest) = handle.position.split_first().ok_or_else(unknown)?;
        let mut current = self.roots.get_mut(*first).ok_or_else(unknown)?;
        for index in rest {
            current = current.children.get_mut(*index).ok_or_else(unknown)?;
        }

        if current.id != handle.id {
            return Err(unknown().into());
        }
        Ok(current)
    }

    /// Pre-order walk of the tree
    ///
    /// The returned sections are paired with their depth, top-level sections
    /// have depth 0.
    pub fn walk(&self) -> Vec<(usize, &Section)> {
        let mut result = Vec::new();
        Self::walk_into(&self.roots, 0, &mut result);
        result
    }

    fn walk_into<'a>(sections: &'a [Section], depth: usize, result: &mut Vec<(usize, &'a Section)>) {
        for section in sections {
            result.push((depth, section));
            Self::walk_into(&section.children, depth + 1, result);
        }
    }

    /// The reading order of the book, as table of contents entries
    pub fn reading_order(&self) -> Vec<TocEntry> {
        self.walk()
            .into_iter()
            .map(|(depth, section)| TocEntry {
                depth,
                id: section.id.clone(),
                path: section.path.clone(),
                label: section.label(),
            })
            .collect()
    }
}
