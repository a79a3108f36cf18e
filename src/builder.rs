//! Epub Builder
//!
//! This module provides functionality for assembling EPUB 3 packages.
//! The `EpubBook` structure tracks the metadata, the section tree and the
//! embedded resources of a book, then renders and packages everything into a
//! single container file when [EpubBook::make] is called.
//!
//! ## Usage
//!
//! ```rust, no_run
//! # fn main() -> Result<(), epub_assembler::error::EpubError> {
//! use epub_assembler::{builder::EpubBook, types::SectionItem};
//!
//! let mut book = EpubBook::new("My title")?;
//! book.set_author("Hingle McCringleberry");
//!
//! let css = book.add_stylesheet(b"p { text-indent: 1em; }".to_vec(), Some("main.css"))?;
//! let image = book.add_image(std::path::PathBuf::from("path/to/figure.png"), None)?;
//!
//! let body = format!("<h1>Chapter 1</h1><img src=\"{}\" alt=\"\"/>", image.href());
//! let chapter = book.add_section(
//!     None,
//!     SectionItem::new(&body).with_title("Chapter 1").with_stylesheet(&css),
//! )?;
//! book.add_section(Some(&chapter), SectionItem::new("<p>...</p>").with_title("Section 1.1"))?;
//!
//! book.make("output.epub")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Notes
//!
//! - Files are written to a temporary staging directory during export;
//!   it is removed whether the export succeeds or not.
//! - Nothing is written to the output path unless the whole export succeeds.

mod allocator;
mod package;
mod render;
mod section;
mod store;

use std::{
    io::Read,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use log::debug;
use uuid::Uuid;

use crate::{
    builder::{
        allocator::{Allocation, Allocator},
        render::{PackageModel, SectionDocument},
        section::{Section, SectionTree},
        store::ResourceStore,
    },
    error::{ConfigurationError, EpubError},
    types::{
        ItemKind, ManifestItem, MetadataItem, MetadataRefinement, PageProgression,
        ResourceHandle, ResourceKind, ResourceSource, SectionHandle, SectionItem, SpineItem,
    },
};

/// EPUB Book
///
/// The root aggregate of a book under construction. It owns the allocation
/// table, the resource store and the section tree, and is consumed by
/// [EpubBook::make], which exports it exactly once.
pub struct EpubBook {
    title: String,
    author: Option<String>,
    description: Option<String>,
    language: String,

    /// Unique identifier, a `urn:uuid:` is generated at export when unset
    identifier: Option<String>,

    /// Fixed modification time, the export time is used when unset
    modified: Option<DateTime<Utc>>,

    page_progression: Option<PageProgression>,

    /// Directory in which the staging directory is created
    staging_root: Option<PathBuf>,

    allocator: Allocator,
    store: ResourceStore,
    sections: SectionTree,
    cover: Option<ResourceHandle>,

    nav: Allocation,
    ncx: Allocation,
}

impl EpubBook {
    /// Create a new, empty book
    ///
    /// The navigation document and the legacy `toc.ncx` are allocated first,
    /// so they are always the first two entries of the manifest.
    ///
    /// # Return
    /// - `Ok(EpubBook)`: Book created successfully
    /// - `Err(EpubError)`: The title is empty
    pub fn new(title: &str) -> Result<Self, EpubError> {
        if title.trim().is_empty() {
            return Err(ConfigurationError::EmptyTitle.into());
        }

        let mut allocator = Allocator::new();
        let nav = allocator.allocate(ItemKind::Navigation, None, None)?;
        let ncx = allocator.allocate(ItemKind::Ncx, None, None)?;

        Ok(EpubBook {
            title: title.to_string(),
            author: None,
            description: None,
            language: "en".to_string(),
            identifier: None,
            modified: None,
            page_progression: None,
            staging_root: None,

            allocator,
            store: ResourceStore::new(),
            sections: SectionTree::new(),
            cover: None,

            nav,
            ncx,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the author, written as the `dc:creator` of the book
    pub fn set_author(&mut self, author: &str) -> &mut Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn set_description(&mut self, description: &str) -> &mut Self {
        self.description = Some(description.to_string());
        self
    }

    /// Set the language code of the book, "en" by default
    pub fn set_language(&mut self, language: &str) -> Result<&mut Self, EpubError> {
        if language.trim().is_empty() {
            return Err(ConfigurationError::EmptyValue {
                field: "language".to_string(),
            }
            .into());
        }

        self.language = language.to_string();
        Ok(self)
    }

    /// Set the unique identifier of the book
    ///
    /// Without an identifier, a random `urn:uuid:` is generated at export.
    pub fn set_identifier(&mut self, identifier: &str) -> Result<&mut Self, EpubError> {
        if identifier.trim().is_empty() {
            return Err(ConfigurationError::EmptyValue {
                field: "identifier".to_string(),
            }
            .into());
        }

        self.identifier = Some(identifier.to_string());
        Ok(self)
    }

    /// Fix the `dcterms:modified` timestamp instead of using the export time
    pub fn set_modified(&mut self, modified: DateTime<Utc>) -> &mut Self {
        self.modified = Some(modified);
        self
    }

    pub fn set_page_progression(&mut self, direction: PageProgression) -> &mut Self {
        self.page_progression = Some(direction);
        self
    }

    /// Set the directory in which the temporary staging directory is created
    ///
    /// Defaults to the system temporary directory.
    pub fn set_staging_root<P: AsRef<Path>>(&mut self, root: P) -> &mut Self {
        self.staging_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Add a section
    ///
    /// The section is appended as the last child of `parent`, or as a new
    /// top-level section when `parent` is `None`. The reading order of the
    /// book is the pre-order walk of the resulting tree.
    ///
    /// # Parameters
    /// - `parent`: Handle of a previously added section
    /// - `section`: The section to add
    ///
    /// # Return
    /// - `Ok(SectionHandle)`: Handle of the new section, usable as a parent
    /// - `Err(EpubError)`: Unknown parent or stylesheet, or invalid filename
    pub fn add_section(
        &mut self,
        parent: Option<&SectionHandle>,
        section: SectionItem,
    ) -> Result<SectionHandle, EpubError> {
        if let Some(parent) = parent {
            if self.sections.get(parent).is_none() {
                return Err(ConfigurationError::UnknownSection {
                    id: parent.id.clone(),
                }
                .into());
            }
        }
        for stylesheet in &section.stylesheets {
            if stylesheet.kind != ItemKind::Stylesheet || !self.store.contains(stylesheet) {
                return Err(ConfigurationError::UnknownResource {
                    id: stylesheet.id.clone(),
                }
                .into());
            }
        }

        let allocation = self.allocator.allocate(
            ItemKind::Section,
            section.filename.as_deref(),
            Some("xhtml"),
        )?;

        self.sections.insert(
            parent,
            Section {
                id: allocation.id,
                path: allocation.path,
                title: section.title,
                body: section.body,
                stylesheets: section
                    .stylesheets
                    .into_iter()
                    .map(|stylesheet| stylesheet.path)
                    .collect(),
                children: vec![],
            },
        )
    }

    /// Add an image resource
    ///
    /// The media type is inferred from the content or the file extension.
    pub fn add_image<S: Into<ResourceSource>>(
        &mut self,
        source: S,
        filename: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        self.add_resource(ResourceKind::Image, source, filename, None)
    }

    pub fn add_font<S: Into<ResourceSource>>(
        &mut self,
        source: S,
        filename: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        self.add_resource(ResourceKind::Font, source, filename, None)
    }

    pub fn add_stylesheet<S: Into<ResourceSource>>(
        &mut self,
        source: S,
        filename: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        self.add_resource(ResourceKind::Stylesheet, source, filename, None)
    }

    /// Add an embedded resource
    ///
    /// Adding the same source twice under the same kind returns the handle
    /// of the first addition.
    ///
    /// # Parameters
    /// - `kind`: Kind of the resource
    /// - `source`: Inline bytes, or a path read when the book is exported
    /// - `filename`: Optional internal file name, must be unique within its folder
    /// - `media_type`: Declared media type, inferred when `None`
    ///
    /// # Return
    /// - `Ok(ResourceHandle)`: Handle whose `href` can be used in section markup
    /// - `Err(EpubError)`: Empty media type or invalid filename
    pub fn add_resource<S: Into<ResourceSource>>(
        &mut self,
        kind: ResourceKind,
        source: S,
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        self.store.add(
            &mut self.allocator,
            kind.into(),
            source.into(),
            filename,
            media_type,
        )
    }

    /// Add an embedded resource read from `reader`
    ///
    /// The reader is consumed completely before this function returns.
    pub fn add_resource_from_reader<R: Read>(
        &mut self,
        kind: ResourceKind,
        mut reader: R,
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;

        self.add_resource(kind, buf, filename, media_type)
    }

    /// Set the cover image of the book
    ///
    /// The image is listed with the `cover-image` property and referenced by an
    /// EPUB 2 `cover` meta element. A book has at most one cover.
    pub fn set_cover_image<S: Into<ResourceSource>>(
        &mut self,
        source: S,
        filename: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<ResourceHandle, EpubError> {
        if self.cover.is_some() {
            return Err(ConfigurationError::CoverAlreadySet.into());
        }

        let handle = self.store.add(
            &mut self.allocator,
            ItemKind::Cover,
            source.into(),
            filename,
            media_type,
        )?;
        self.cover = Some(handle.clone());

        Ok(handle)
    }

    /// Builds an EPUB file and saves it to the specified path
    ///
    /// Freezes the book, renders every document and packages them. When any
    /// step fails, no file is left at `output_path`.
    ///
    /// # Parameters
    /// - `output_path`: Output file path
    ///
    /// # Return
    /// - `Ok(())`: Build successful
    /// - `Err(EpubError)`: Error occurred during the build process
    pub fn make<P: AsRef<Path>>(mut self, output_path: P) -> Result<(), EpubError> {
        let model = self.finalize()?;
        let artifacts = render::render(&model)?;

        package::package(
            self.staging_root.as_deref(),
            &artifacts,
            output_path.as_ref(),
        )
    }

    /// Freeze the allocation table and snapshot the book for rendering
    ///
    /// Resource sources are read here, so unreadable sources are reported
    /// before any archive bytes exist.
    fn finalize(&mut self) -> Result<PackageModel, EpubError> {
        self.allocator.freeze();

        let identifier = self
            .identifier
            .clone()
            .unwrap_or_else(|| format!("urn:uuid:{}", Uuid::new_v4()));
        let modified = self
            .modified
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let resources = self.store.load()?;
        let toc = self.sections.reading_order();

        let nav = ManifestItem {
            id: self.nav.id.clone(),
            path: self.nav.path.clone(),
            mime: "application/xhtml+xml".to_string(),
            properties: Some("nav".to_string()),
            kind: ItemKind::Navigation,
        };
        let ncx = ManifestItem {
            id: self.ncx.id.clone(),
            path: self.ncx.path.clone(),
            mime: "application/x-dtbncx+xml".to_string(),
            properties: None,
            kind: ItemKind::Ncx,
        };

        // Sections and resources share the allocation counters but live in
        // separate collections; restore allocation order by merging them.
        let mut entries = Vec::new();
        for (_, section) in self.sections.walk() {
            entries.push(ManifestItem {
                id: section.id.clone(),
                path: section.path.clone(),
                mime: "application/xhtml+xml".to_string(),
                properties: None,
                kind: ItemKind::Section,
            });
        }
        for resource in &resources {
            let properties = (resource.kind == ItemKind::Cover).then(|| "cover-image".to_string());
            entries.push(ManifestItem {
                id: resource.id.clone(),
                path: resource.path.clone(),
                mime: resource.mime.clone(),
                properties,
                kind: resource.kind,
            });
        }
        entries.sort_by_key(|item| self.allocator.sequence(&item.id));

        let mut manifest = IndexMap::new();
        for item in [nav.clone(), ncx.clone()].into_iter().chain(entries) {
            manifest.insert(item.id.clone(), item);
        }

        let spine = toc
            .iter()
            .map(|entry| SpineItem::new(&entry.id))
            .collect::<Vec<_>>();

        let sections = self
            .sections
            .walk()
            .into_iter()
            .map(|(_, section)| SectionDocument {
                path: section.path.clone(),
                title: section.title.clone(),
                body: section.body.clone(),
                stylesheets: section.stylesheets.clone(),
            })
            .collect();

        debug!(
            "finalized '{}': {} manifest items, {} resources, {} spine items",
            self.title,
            manifest.len(),
            self.store.len(),
            spine.len()
        );

        Ok(PackageModel {
            title: self.title.clone(),
            language: self.language.clone(),
            identifier: identifier.clone(),
            metadata: self.metadata(&identifier, &modified),
            cover: self.cover.as_ref().map(|cover| cover.id.clone()),
            page_progression: self.page_progression,
            manifest,
            spine,
            toc,
            sections,
            resources,
            nav,
            ncx,
        })
    }

    /// Metadata items in the order they are written to the package document
    fn metadata(&self, identifier: &str, modified: &str) -> Vec<MetadataItem> {
        let mut metadata = vec![
            MetadataItem::new("identifier", identifier).with_id("pub-id"),
            MetadataItem::new("title", &self.title),
            MetadataItem::new("language", &self.language),
        ];

        if let Some(author) = &self.author {
            metadata.push(
                MetadataItem::new("creator", author)
                    .with_id("creator")
                    .with_refinement(
                        MetadataRefinement::new("role", "aut").with_scheme("marc:relators"),
                    ),
            );
        }
        if let Some(description) = &self.description {
            metadata.push(MetadataItem::new("description", description));
        }
        metadata.push(MetadataItem::new("dcterms:modified", modified));

        metadata
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{self, File},
        io::{Cursor, Read},
        path::{Path, PathBuf},
    };

    use chrono::{TimeZone, Utc};
    use zip::{CompressionMethod, ZipArchive};

    use crate::{
        builder::EpubBook,
        error::{ConfigurationError, EpubError, ResourceError},
        types::{ItemKind, PageProgression, ResourceKind, SectionItem},
    };

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn open(path: &Path) -> ZipArchive<File> {
        ZipArchive::new(File::open(path).unwrap()).unwrap()
    }

    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    fn book() -> EpubBook {
        let mut book = EpubBook::new("My title").unwrap();
        book.set_modified(Utc.with_ymd_and_hms(2016, 4, 28, 19, 9, 26).unwrap());
        book
    }

    fn make(book: EpubBook) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("book.epub");

        let mut book = book;
        book.set_staging_root(dir.path());
        book.make(&output).unwrap();

        (dir, output)
    }

    #[test]
    fn test_new_rejects_empty_title() {
        assert_eq!(
            EpubBook::new("").err(),
            Some(EpubError::from(ConfigurationError::EmptyTitle))
        );
        assert!(EpubBook::new("   ").is_err());
        assert_eq!(EpubBook::new("My title").unwrap().title(), "My title");
    }

    #[test]
    fn test_set_language_and_identifier() {
        let mut book = book();

        assert!(book.set_language("fr").is_ok());
        assert_eq!(
            book.set_language("").err(),
            Some(EpubError::from(ConfigurationError::EmptyValue {
                field: "language".to_string()
            }))
        );
        assert_eq!(
            book.set_identifier(" ").err(),
            Some(EpubError::from(ConfigurationError::EmptyValue {
                field: "identifier".to_string()
            }))
        );
        book.set_identifier("urn:isbn:9780000000000").unwrap();

        let (_dir, output) = make(book);
        let opf = read_entry(&mut open(&output), "EPUB/package.opf");
        assert!(opf.contains("<dc:language>fr</dc:language>"));
        assert!(opf.contains(r#"<dc:identifier id="pub-id">urn:isbn:9780000000000</dc:identifier>"#));
    }

    #[test]
    fn test_make_container_layout() {
        let mut book = book();
        book.add_section(None, SectionItem::new("<p>Hello</p>")).unwrap();

        let (_dir, output) = make(book);
        let mut archive = open(&output);

        {
            let mut first = archive.by_index(0).unwrap();
            assert_eq!(first.name(), "mimetype");
            assert_eq!(first.compression(), CompressionMethod::Stored);

            let mut content = Vec::new();
            first.read_to_end(&mut content).unwrap();
            assert_eq!(content, b"application/epub+zip");
        }

        let container = read_entry(&mut archive, "META-INF/container.xml");
        assert!(container.contains(
            r#"<rootfile full-path="EPUB/package.opf" media-type="application/oebps-package+xml"/>"#
        ));

        for name in ["EPUB/package.opf", "EPUB/nav.xhtml", "EPUB/toc.ncx", "EPUB/xhtml/section0001.xhtml"] {
            assert!(archive.by_name(name).is_ok(), "missing {}", name);
        }
    }

    #[test]
    fn test_make_minimal_book() {
        let (_dir, output) = make(book());
        let mut archive = open(&output);

        let opf = read_entry(&mut archive, "EPUB/package.opf");
        assert!(opf.contains("<dc:title>My title</dc:title>"));
        assert!(!opf.contains("dc:creator"));
        assert!(opf.contains(r#"<meta property="dcterms:modified">2016-04-28T19:09:26Z</meta>"#));
        assert!(opf.contains(r#"<dc:identifier id="pub-id">urn:uuid:"#));
        assert_eq!(opf.matches("<item ").count(), 2);
        assert!(!opf.contains("<itemref"));

        let nav = read_entry(&mut archive, "EPUB/nav.xhtml");
        assert_eq!(nav.matches("<li>").count(), 1);
        assert!(nav.contains(r#"<a href="nav.xhtml">My title</a>"#));

        let ncx = read_entry(&mut archive, "EPUB/toc.ncx");
        assert_eq!(ncx.matches("<navPoint ").count(), 1);
    }

    #[test]
    fn test_make_with_author_and_description() {
        let mut book = book();
        book.set_author("Hingle McCringleberry")
            .set_description("A book about nothing")
            .set_page_progression(PageProgression::Rtl);

        let (_dir, output) = make(book);
        let opf = read_entry(&mut open(&output), "EPUB/package.opf");

        assert!(opf.contains(r#"<dc:creator id="creator">Hingle McCringleberry</dc:creator>"#));
        assert!(opf.contains(
            r##"<meta refines="#creator" property="role" scheme="marc:relators">aut</meta>"##
        ));
        assert!(opf.contains("<dc:description>A book about nothing</dc:description>"));
        assert!(opf.contains(r#"page-progression-direction="rtl""#));
    }

    #[test]
    fn test_make_spine_and_navigation_follow_sections() {
        let mut book = book();
        let one = book
            .add_section(None, SectionItem::new("<p>1</p>").with_title("One"))
            .unwrap();
        book.add_section(None, SectionItem::new("<p>2</p>").with_title("Two"))
            .unwrap();
        let nested = book
            .add_section(Some(&one), SectionItem::new("<p>1.1</p>").with_title("One.One"))
            .unwrap();
        book.add_section(Some(&nested), SectionItem::new("<p>1.1.1</p>"))
            .unwrap();

        let (_dir, output) = make(book);
        let mut archive = open(&output);

        let opf = read_entry(&mut archive, "EPUB/package.opf");
        let itemrefs = opf
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("<itemref"))
            .collect::<Vec<_>>();
        assert_eq!(
            itemrefs,
            vec![
                r#"<itemref idref="section0001"/>"#,
                r#"<itemref idref="section0003"/>"#,
                r#"<itemref idref="section0004"/>"#,
                r#"<itemref idref="section0002"/>"#,
            ]
        );

        let nav = read_entry(&mut archive, "EPUB/nav.xhtml");
        let labels = nav
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("<a href"))
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                r#"<a href="xhtml/section0001.xhtml">One</a>"#,
                r#"<a href="xhtml/section0003.xhtml">One.One</a>"#,
                r#"<a href="xhtml/section0004.xhtml">section0004</a>"#,
                r#"<a href="xhtml/section0002.xhtml">Two</a>"#,
            ]
        );
        assert_eq!(nav.matches("<ol>").count(), 3);

        let ncx = read_entry(&mut archive, "EPUB/toc.ncx");
        assert_eq!(ncx.matches("<navPoint ").count(), 4);
    }

    #[test]
    fn test_make_resources_and_stylesheets() {
        let mut book = book();
        let css = book
            .add_stylesheet(b"p { margin: 0; }".to_vec(), Some("main.css"))
            .unwrap();
        let image = book.add_image(PNG_HEADER, None).unwrap();
        assert_eq!(image.href(), "../images/image0001.png");

        let body = format!(r#"<p><img src="{}" alt=""/></p>"#, image.href());
        book.add_section(None, SectionItem::new(&body).with_stylesheet(&css))
            .unwrap();

        let (_dir, output) = make(book);
        let mut archive = open(&output);

        let opf = read_entry(&mut archive, "EPUB/package.opf");
        let items = opf
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with("<item "))
            .collect::<Vec<_>>();
        assert_eq!(
            items,
            vec![
                r#"<item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>"#,
                r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
                r#"<item id="css0001" href="css/main.css" media-type="text/css"/>"#,
                r#"<item id="image0001" href="images/image0001.png" media-type="image/png"/>"#,
                r#"<item id="section0001" href="xhtml/section0001.xhtml" media-type="application/xhtml+xml"/>"#,
            ]
        );

        let section = read_entry(&mut archive, "EPUB/xhtml/section0001.xhtml");
        assert!(section.contains(r#"<link rel="stylesheet" type="text/css" href="../css/main.css"/>"#));
        assert!(section.contains(r#"<img src="../images/image0001.png" alt=""/>"#));
        assert_eq!(read_entry(&mut archive, "EPUB/css/main.css"), "p { margin: 0; }");
    }

    #[test]
    fn test_add_resource_deduplicates() {
        let mut book = book();

        let first = book.add_image(PNG_HEADER, None).unwrap();
        let second = book.add_image(PNG_HEADER.to_vec(), None).unwrap();
        assert_eq!(first, second);

        let from_reader = book
            .add_resource_from_reader(ResourceKind::Image, Cursor::new(PNG_HEADER), None, None)
            .unwrap();
        assert_eq!(first, from_reader);

        let (_dir, output) = make(book);
        let opf = read_entry(&mut open(&output), "EPUB/package.opf");
        assert_eq!(opf.matches(r#"media-type="image/png""#).count(), 1);
    }

    #[test]
    fn test_add_section_rejects_duplicate_filename() {
        let mut book = book();
        book.add_section(None, SectionItem::new("").with_filename("intro.xhtml"))
            .unwrap();

        let result = book.add_section(None, SectionItem::new("").with_filename("intro.xhtml"));
        assert_eq!(
            result.err(),
            Some(EpubError::from(ConfigurationError::DuplicateFilename {
                path: "xhtml/intro.xhtml".to_string()
            }))
        );
    }

    #[test]
    fn test_filenames_must_be_url_safe() {
        let mut book = book();

        assert_eq!(
            book.add_image(PNG_HEADER, Some("fig#1.png")).err(),
            Some(EpubError::from(ConfigurationError::InvalidFilename {
                filename: "fig#1.png".to_string()
            }))
        );
        assert_eq!(
            book.add_section(None, SectionItem::new("").with_filename("my chapter.xhtml"))
                .err(),
            Some(EpubError::from(ConfigurationError::InvalidFilename {
                filename: "my chapter.xhtml".to_string()
            }))
        );

        let image = book.add_image(PNG_HEADER, Some("fig-1_a~b.png")).unwrap();
        assert_eq!(image.href(), "../images/fig-1_a~b.png");
    }

    #[test]
    fn test_add_section_rejects_unknown_stylesheet() {
        let mut book = book();
        let mut other = EpubBook::new("Other").unwrap();
        let foreign = other.add_stylesheet(b"a {}".to_vec(), None).unwrap();
        let image = book.add_image(PNG_HEADER, None).unwrap();

        for handle in [&foreign, &image] {
            let result = book.add_section(None, SectionItem::new("").with_stylesheet(handle));
            assert_eq!(
                result.err(),
                Some(EpubError::from(ConfigurationError::UnknownResource {
                    id: handle.id().to_string()
                }))
            );
        }
    }

    #[test]
    fn test_set_cover_image() {
        let mut book = book();
        let cover = book.set_cover_image(PNG_HEADER, None, None).unwrap();
        assert_eq!(cover.id(), "cover");
        assert_eq!(cover.kind(), ItemKind::Cover);
        assert_eq!(cover.path(), "images/cover.png");

        assert_eq!(
            book.set_cover_image(b"other".to_vec(), None, Some("image/jpeg")).err(),
            Some(EpubError::from(ConfigurationError::CoverAlreadySet))
        );

        let (_dir, output) = make(book);
        let opf = read_entry(&mut open(&output), "EPUB/package.opf");
        assert!(opf.contains(
            r#"<item id="cover" href="images/cover.png" media-type="image/png" properties="cover-image"/>"#
        ));
        assert!(opf.contains(r#"<meta name="cover" content="cover"/>"#));
    }

    #[test]
    fn test_make_fails_on_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("book.epub");

        let mut book = book();
        book.set_staging_root(dir.path());
        book.add_section(None, SectionItem::new("<p>text</p>")).unwrap();
        book.add_image(dir.path().join("missing.png"), None).unwrap();

        match book.make(&output) {
            Err(EpubError::ResourceError {
                source: ResourceError::UnreadableSource { id, .. },
            }) => assert_eq!(id, "image0001"),
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }

        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_make_failure_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("book.epub");
        fs::write(&output, b"OLD").unwrap();

        let mut book = book();
        book.set_staging_root(dir.path());
        book.add_image(dir.path().join("missing.png"), None).unwrap();

        assert!(book.make(&output).is_err());
        assert_eq!(fs::read(&output).unwrap(), b"OLD");

        let names = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["book.epub".to_string()]);
    }

    #[test]
    fn test_make_fails_on_unsupported_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("book.epub");

        let mut book = book();
        book.set_staging_root(dir.path());
        book.add_resource(ResourceKind::Font, b"data".to_vec(), Some("font.bin"), Some("application/octet-stream"))
            .unwrap();

        assert_eq!(
            book.make(&output).err(),
            Some(EpubError::from(ResourceError::UnsupportedMediaType {
                id: "font0001".to_string(),
                media_type: "application/octet-stream".to_string()
            }))
        );
        assert!(!output.exists());
    }

    #[test]
    fn test_make_is_reproducible_with_fixed_identity() {
        let build = || {
            let mut book = book();
            book.set_identifier("urn:uuid:00000000-0000-0000-0000-000000000000")
                .unwrap();
            book.add_section(None, SectionItem::new("<p>same</p>").with_title("Same"))
                .unwrap();
            let (_dir, output) = make(book);
            read_entry(&mut open(&output), "EPUB/package.opf")
        };

        assert_eq!(build(), build());
    }
}
