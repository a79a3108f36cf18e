//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while assembling
//! an EPUB package. All errors are uniformly wrapped in the `EpubError`
//! enumeration for convenient error handling by the caller.
//!
//! ## Main Error Types
//!
//! - [EpubError] - Enumeration of every error an export can return
//! - [ConfigurationError] - Caller misuse, reported at the offending call
//! - [ResourceError] - Unreadable sources or unusable media types
//! - [RenderError] - Broken internal invariants detected while rendering

use thiserror::Error;

/// Types of errors that can occur while assembling an EPUB
///
/// Domain errors are grouped into three nested enumerations, while errors
/// raised by the file system and the archive writer are wrapped directly.
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Errors occur when the archive writer fails to add an entry
    /// or to finish the central directory.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    #[error("Configuration error: {source}")]
    ConfigurationError { source: ConfigurationError },

    /// IO error
    ///
    /// File system failures, and failures of the XML writer,
    /// which reports through `std::io::Error`.
    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// Rendering error
    ///
    /// A rendering error means the engine produced an inconsistent model,
    /// it is never caused by caller input alone.
    #[error("Render error: {source}")]
    RenderError { source: RenderError },

    #[error("Resource error: {source}")]
    ResourceError { source: ResourceError },

    /// WalkDir error
    ///
    /// This error occurs when traversing the staging directory.
    #[error("WalkDir error: {source}")]
    WalkDirError { source: walkdir::Error },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

impl From<walkdir::Error> for EpubError {
    fn from(value: walkdir::Error) -> Self {
        EpubError::WalkDirError { source: value }
    }
}

impl From<ConfigurationError> for EpubError {
    fn from(value: ConfigurationError) -> Self {
        EpubError::ConfigurationError { source: value }
    }
}

impl From<ResourceError> for EpubError {
    fn from(value: ResourceError) -> Self {
        EpubError::ResourceError { source: value }
    }
}

impl From<RenderError> for EpubError {
    fn from(value: RenderError) -> Self {
        EpubError::RenderError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::ConfigurationError { source: l_source },
                Self::ConfigurationError { source: r_source },
            ) => l_source == r_source,
            (
                Self::ResourceError { source: l_source },
                Self::ResourceError { source: r_source },
            ) => l_source == r_source,
            (Self::RenderError { source: l_source }, Self::RenderError { source: r_source }) => {
                l_source == r_source
            }

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// Errors caused by the way the book was configured
///
/// These errors are returned immediately by the call that caused them,
/// the book stays usable afterwards.
#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ConfigurationError {
    /// Allocation after finalize error
    ///
    /// This error is triggered when an identifier or path is requested
    /// after the allocation table has been frozen for export.
    #[error("Identifiers can not be allocated after the book has been finalized.")]
    AllocationAfterFinalize,

    #[error("A cover image has already been set.")]
    CoverAlreadySet,

    /// Duplicate filename error
    ///
    /// This error is triggered when a caller-supplied filename resolves to
    /// an internal path that is already in use.
    #[error("The internal path '{path}' is already in use.")]
    DuplicateFilename { path: String },

    #[error("The manifest id '{id}' is already in use.")]
    DuplicateId { id: String },

    #[error("The book title must not be empty.")]
    EmptyTitle,

    #[error("The value of '{field}' must not be empty.")]
    EmptyValue { field: String },

    /// Invalid filename error
    ///
    /// Caller-supplied filenames must be a single, non-empty path component.
    #[error("'{filename}' is not a valid internal filename.")]
    InvalidFilename { filename: String },

    #[error("There is no resource with id '{id}' in this book.")]
    UnknownResource { id: String },

    #[error("There is no section with id '{id}' in this book.")]
    UnknownSection { id: String },
}

/// Errors caused by embedded resources
///
/// Raised either by the `add` call or, for sources that are read lazily,
/// during finalize. Always before any archive bytes are written.
#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ResourceError {
    #[error("The declared media type for '{filename}' is empty.")]
    EmptyMediaType { filename: String },

    /// Unknown media type error
    ///
    /// No media type was declared and none could be inferred
    /// from the content or the file extension.
    #[error("Unable to determine the media type of resource '{id}'.")]
    UnknownMediaType { id: String },

    /// Unreadable source error
    ///
    /// This error is triggered when the source of resource `id` can not be read.
    #[error("Unable to read the source '{source_path}' of resource '{id}': {reason}")]
    UnreadableSource {
        id: String,
        source_path: String,
        reason: String,
    },

    #[error("The media type '{media_type}' of resource '{id}' is not supported.")]
    UnsupportedMediaType { id: String, media_type: String },
}

/// Errors raised while rendering the package documents
///
/// Each of these indicates an engine bug rather than caller misuse.
#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq))]
pub enum RenderError {
    #[error("The internal path '{path}' appears more than once in the manifest.")]
    DuplicateManifestPath { path: String },

    #[error("The artifact path '{path}' escapes the package root.")]
    InvalidArtifactPath { path: String },

    #[error("'{id}' is not a valid manifest id.")]
    InvalidManifestId { id: String },

    #[error("The spine references '{id}', which is not in the manifest.")]
    MissingManifestItem { id: String },

    /// Navigation and spine mismatch error
    ///
    /// The navigation document and the spine are derived from the same walk,
    /// so a different entry count means the walk was not used for both.
    #[error("The navigation lists {navigation} entries but the spine has {spine}.")]
    NavigationSpineMismatch { navigation: usize, spine: usize },
}
