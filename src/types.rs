//! Types used to describe a book
//!
//! Public value types handed to and returned from [crate::builder::EpubBook],
//! and the metadata, manifest and spine items the package document is rendered from.

use std::path::{Path, PathBuf};

use crate::utils::relative_href;

/// The kind of an item tracked by the allocation table
///
/// Every manifest entry belongs to exactly one kind. The kind decides the
/// prefix of its manifest id and the folder it is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Section,
    Image,
    Font,
    Stylesheet,
    Cover,
    Navigation,
    Ncx,
}

impl ItemKind {
    /// Prefix of the generated manifest id
    pub(crate) fn prefix(&self) -> &'static str {
        match self {
            ItemKind::Section => "section",
            ItemKind::Image => "image",
            ItemKind::Font => "font",
            ItemKind::Stylesheet => "css",
            ItemKind::Cover => "cover",
            ItemKind::Navigation => "nav",
            ItemKind::Ncx => "ncx",
        }
    }

    /// Folder below the content root, empty for files stored at the root
    pub(crate) fn folder(&self) -> &'static str {
        match self {
            ItemKind::Section => "xhtml",
            ItemKind::Image | ItemKind::Cover => "images",
            ItemKind::Font => "fonts",
            ItemKind::Stylesheet => "css",
            ItemKind::Navigation | ItemKind::Ncx => "",
        }
    }

    /// Kinds that exist at most once per book and carry a fixed id and path
    pub(crate) fn fixed_name(&self) -> Option<(&'static str, &'static str)> {
        match self {
            ItemKind::Navigation => Some(("nav", "nav.xhtml")),
            ItemKind::Ncx => Some(("ncx", "toc.ncx")),
            _ => None,
        }
    }
}

/// Kinds of resources a caller can embed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Font,
    Stylesheet,
}

impl From<ResourceKind> for ItemKind {
    fn from(value: ResourceKind) -> Self {
        match value {
            ResourceKind::Image => ItemKind::Image,
            ResourceKind::Font => ItemKind::Font,
            ResourceKind::Stylesheet => ItemKind::Stylesheet,
        }
    }
}

/// Where the bytes of a resource come from
///
/// Inline bytes are owned by the book as soon as they are added. A path is
/// read when the book is finalized, and a failure to read it aborts the export.
#[derive(Debug, Clone)]
pub enum ResourceSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl From<Vec<u8>> for ResourceSource {
    fn from(value: Vec<u8>) -> Self {
        ResourceSource::Bytes(value)
    }
}

impl From<&[u8]> for ResourceSource {
    fn from(value: &[u8]) -> Self {
        ResourceSource::Bytes(value.to_vec())
    }
}

impl From<PathBuf> for ResourceSource {
    fn from(value: PathBuf) -> Self {
        ResourceSource::Path(value)
    }
}

impl From<&Path> for ResourceSource {
    fn from(value: &Path) -> Self {
        ResourceSource::Path(value.to_path_buf())
    }
}

/// Reading direction written on the spine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageProgression {
    Ltr,
    Rtl,
}

impl PageProgression {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            PageProgression::Ltr => "ltr",
            PageProgression::Rtl => "rtl",
        }
    }
}

/// Represents a metadata item in the package document
///
/// Items whose property belongs to the Dublin Core namespace are rendered as
/// `dc:*` elements, every other property is rendered as a `meta` element.
#[derive(Debug, Clone)]
pub struct MetadataItem {
    /// Optional unique identifier for this metadata item
    ///
    /// Refinements point at their parent item through this id.
    pub id: Option<String>,

    /// The metadata property name, such as "title" or "dcterms:modified"
    pub property: String,

    /// The metadata value
    pub value: String,

    /// Refinements of this metadata item
    pub refined: Vec<MetadataRefinement>,
}

impl MetadataItem {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            id: None,
            property: property.to_string(),
            value: value.to_string(),
            refined: vec![],
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_refinement(mut self, refinement: MetadataRefinement) -> Self {
        self.refined.push(refinement);
        self
    }

    /// Attributes of the rendered element
    ///
    /// `meta` elements carry their property as an attribute,
    /// Dublin Core elements carry it in the tag name.
    pub(crate) fn attributes(&self, is_dc: bool) -> Vec<(&str, &str)> {
        let mut attributes = Vec::new();

        if let Some(id) = &self.id {
            attributes.push(("id", id.as_str()));
        }
        if !is_dc {
            attributes.push(("property", self.property.as_str()));
        }

        attributes
    }
}

/// Represents a refinement of a metadata item
///
/// A creator item, for example, is refined with the role of the creator.
#[derive(Debug, Clone)]
pub struct MetadataRefinement {
    /// The refinement property name, such as "role" or "file-as"
    pub property: String,

    /// The refinement value
    pub value: String,

    /// Optional scheme identifier for this refinement
    ///
    /// For example, "marc:relators" for MARC relator codes.
    pub scheme: Option<String>,
}

impl MetadataRefinement {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            property: property.to_string(),
            value: value.to_string(),
            scheme: None,
        }
    }

    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    pub(crate) fn attributes<'a>(&'a self, refines: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut attributes = vec![("refines", refines), ("property", self.property.as_str())];

        if let Some(scheme) = &self.scheme {
            attributes.push(("scheme", scheme.as_str()));
        }

        attributes
    }
}

/// Represents a resource item declared in the manifest
///
/// Items are kept in allocation order, which is also the order
/// in which they are rendered in the package document.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    /// The manifest id, a valid XML name unique within the book
    pub id: String,

    /// The path of the item relative to the content root, `/` separated
    pub path: String,

    /// The media type of the item
    pub mime: String,

    /// Optional space-separated properties, such as "nav" or "cover-image"
    pub properties: Option<String>,

    pub kind: ItemKind,
}

impl ManifestItem {
    pub(crate) fn attributes(&self) -> Vec<(&str, &str)> {
        let mut attributes = vec![
            ("id", self.id.as_str()),
            ("href", self.path.as_str()),
            ("media-type", self.mime.as_str()),
        ];

        if let Some(properties) = &self.properties {
            attributes.push(("properties", properties.as_str()));
        }

        attributes
    }
}

/// Represents an item in the spine, defining the reading order of the publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// The id of the manifest item this spine item references
    pub idref: String,
}

impl SpineItem {
    pub fn new(idref: &str) -> Self {
        Self { idref: idref.to_string() }
    }

    pub(crate) fn attributes(&self) -> Vec<(&str, &str)> {
        vec![("idref", self.idref.as_str())]
    }
}

/// One entry of the table of contents
///
/// The table of contents is a pre-order listing of the section tree;
/// `depth` records how far below the top level the section sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub depth: usize,

    /// Manifest id of the section
    pub id: String,

    /// Path of the section document relative to the content root
    pub path: String,

    /// Navigation label, the section title or its file stem
    pub label: String,
}

/// A section waiting to be added to a book
///
/// ## Example
/// ```rust
/// use epub_assembler::types::SectionItem;
///
/// let section = SectionItem::new("<h1>Chapter 1</h1><p>It was a dark and stormy night.</p>")
///     .with_title("Chapter 1")
///     .with_filename("chapter1.xhtml");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SectionItem {
    pub(crate) title: Option<String>,

    /// XHTML fragment placed inside `<body>`, written without modification
    pub(crate) body: String,

    pub(crate) filename: Option<String>,

    /// Manifest ids and paths of the stylesheets linked from the section
    pub(crate) stylesheets: Vec<ResourceHandle>,
}

impl SectionItem {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Default::default()
        }
    }

    /// Set the title used as the navigation label
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Set the internal filename of the section document
    ///
    /// Without a filename, a name is generated from the section counter.
    /// Filenames may only contain ASCII letters, digits, `-`, `.`, `_` and `~`.
    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    /// Link a stylesheet, previously added to the book, from the section
    pub fn with_stylesheet(mut self, stylesheet: &ResourceHandle) -> Self {
        self.stylesheets.push(stylesheet.clone());
        self
    }
}

/// Stable handle to a section of a book
///
/// Used to add nested sections below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHandle {
    pub(crate) id: String,

    /// Child indices leading from the top level to the section
    pub(crate) position: Vec<usize>,
}

impl SectionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Stable handle to an embedded resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub(crate) id: String,
    pub(crate) path: String,
    pub(crate) kind: ItemKind,
}

impl ResourceHandle {
    /// The manifest id of the resource
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The path of the resource relative to the content root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path of the resource as seen from a section document
    ///
    /// This is the value to use in `src` or `href` attributes of section markup,
    /// e.g. `../images/image0001.png`.
    pub fn href(&self) -> String {
        relative_href(ItemKind::Section.folder(), &self.path)
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }
}
