//! Epub assembler
//!
//! A Rust library for assembling EPUB 3 eBook files from a set of sections
//! and embedded resources.
//!
//! The library owns every naming decision of the package: manifest ids and
//! internal paths are allocated by the book, so callers only describe content
//! and get back handles they can reference from their markup.
//!
//! ## Features
//!
//! - Build nested section trees; the spine, the navigation document and the
//!   legacy `toc.ncx` are all derived from the same reading order.
//! - Embed images, fonts and stylesheets from bytes, readers or file paths,
//!   with media types inferred from the content.
//! - Package a container whose `mimetype` entry is first and uncompressed.
//! - Atomic export: no file appears at the output path unless the whole
//!   export succeeds.
//!
//! ## Quick Start
//!
//! ```rust, no_run
//! # use epub_assembler::{EpubBook, SectionItem};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut book = EpubBook::new("My title")?;
//! book.set_author("Hingle McCringleberry").set_language("en")?;
//!
//! let chapter = book.add_section(None, SectionItem::new("<h1>Chapter 1</h1>").with_title("Chapter 1"))?;
//! book.add_section(Some(&chapter), SectionItem::new("<p>...</p>").with_title("Section 1.1"))?;
//!
//! book.make("path/to/output.epub")?;
//! # Ok(())
//! # }
//! ```

pub(crate) mod utils;

pub mod builder;
pub mod error;
pub mod types;

pub use builder::EpubBook;
pub use error::EpubError;
pub use types::{PageProgression, ResourceHandle, ResourceKind, ResourceSource, SectionHandle, SectionItem};
