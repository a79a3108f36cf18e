//! Document Renderer
//!
//! Turns a frozen [PackageModel] into the XML artifacts of the package. Every
//! function here is pure: rendering the same model twice yields byte-identical
//! output, so the documents can be inspected without building an archive.

use std::collections::HashSet;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::{
    builder::{package::Artifact, store::LoadedResource},
    error::{EpubError, RenderError, ResourceError},
    types::{ManifestItem, MetadataItem, PageProgression, SpineItem, TocEntry},
    utils::{
        CONTENT_ROOT, ELEMENT_IN_DC_NAMESPACE, EPUB_MIMETYPE, META_INF_FOLDER, MIMETYPE_FILE,
        PACKAGE_FILE, XmlWriter, is_supported_media_type, is_xml_name, relative_href, xml_writer,
    },
};

/// A section ready to be wrapped in an XHTML document
#[derive(Debug, Clone)]
pub(crate) struct SectionDocument {
    pub path: String,
    pub title: Option<String>,
    pub body: String,

    /// Paths of linked stylesheets, relative to the content root
    pub stylesheets: Vec<String>,
}

/// Frozen state of a book, the only input of the renderer
#[derive(Debug, Clone)]
pub(crate) struct PackageModel {
    pub title: String,
    pub language: String,
    pub identifier: String,

    /// Metadata items in rendering order
    pub metadata: Vec<MetadataItem>,

    /// Manifest id of the cover image
    pub cover: Option<String>,

    pub page_progression: Option<PageProgression>,

    /// Manifest items in allocation order
    pub manifest: IndexMap<String, ManifestItem>,

    pub spine: Vec<SpineItem>,

    /// Pre-order listing of the section tree
    pub toc: Vec<TocEntry>,

    pub sections: Vec<SectionDocument>,
    pub resources: Vec<LoadedResource>,

    pub nav: ManifestItem,
    pub ncx: ManifestItem,
}

/// Render every file of the package
///
/// Paths of the returned artifacts are relative to the package root.
pub(crate) fn render(model: &PackageModel) -> Result<Vec<Artifact>, EpubError> {
    let mut artifacts = vec![
        Artifact::new(MIMETYPE_FILE, mimetype()),
        Artifact::new(
            format!("{}/container.xml", META_INF_FOLDER),
            container_xml(&package_path())?,
        ),
        Artifact::new(content_path(PACKAGE_FILE), package_document(model)?),
        Artifact::new(content_path(&model.nav.path), navigation_document(model)?),
        Artifact::new(content_path(&model.ncx.path), ncx_document(model)?),
    ];

    for section in &model.sections {
        artifacts.push(Artifact::new(
            content_path(&section.path),
            section_document(model, section)?,
        ));
    }

    for resource in &model.resources {
        artifacts.push(Artifact::new(
            content_path(&resource.path),
            resource.data.clone(),
        ));
    }

    Ok(artifacts)
}

/// Path of the package document relative to the package root
pub(crate) fn package_path() -> String {
    content_path(PACKAGE_FILE)
}

fn content_path(path: &str) -> String {
    format!("{}/{}", CONTENT_ROOT, path)
}

pub(crate) fn mimetype() -> Vec<u8> {
    EPUB_MIMETYPE.as_bytes().to_vec()
}

/// Creates the `container.xml` file, declaring `rootfile` as the single package document
pub(crate) fn container_xml(rootfile: &str) -> Result<Vec<u8>, EpubError> {
    let mut writer = xml_writer();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.write_event(Event::Start(BytesStart::new("container").with_attributes(
        [
            ("version", "1.0"),
            ("xmlns", "urn:oasis:names:tc:opendocument:xmlns:container"),
        ],
    )))?;
    writer.write_event(Event::Start(BytesStart::new("rootfiles")))?;
    writer.write_event(Event::Empty(BytesStart::new("rootfile").with_attributes([
        ("full-path", rootfile),
        ("media-type", "application/oebps-package+xml"),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("rootfiles")))?;
    writer.write_event(Event::End(BytesEnd::new("container")))?;

    Ok(writer.into_inner().into_inner())
}

/// Creates the package document
///
/// # Error conditions
/// - A manifest id is not a valid XML name
/// - Two manifest items share a path
/// - A manifest item has a media type outside the core set for its kind
/// - The spine references an id missing from the manifest
pub(crate) fn package_document(model: &PackageModel) -> Result<Vec<u8>, EpubError> {
    validate_manifest(&model.manifest)?;
    validate_spine(model)?;

    let mut writer = xml_writer();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.write_event(Event::Start(BytesStart::new("package").with_attributes([
        ("xmlns", "http://www.idpf.org/2007/opf"),
        ("unique-identifier", "pub-id"),
        ("version", "3.0"),
    ])))?;

    make_opf_metadata(&mut writer, model)?;
    make_opf_manifest(&mut writer, &model.manifest)?;
    make_opf_spine(&mut writer, model)?;

    writer.write_event(Event::End(BytesEnd::new("package")))?;

    Ok(writer.into_inner().into_inner())
}

fn make_opf_metadata(writer: &mut XmlWriter, model: &PackageModel) -> Result<(), EpubError> {
    writer.write_event(Event::Start(
        BytesStart::new("metadata").with_attributes([("xmlns:dc", "http://purl.org/dc/elements/1.1/")]),
    ))?;

    for metadata in &model.metadata {
        let is_dc = ELEMENT_IN_DC_NAMESPACE.contains(&metadata.property.as_str());
        let tag_name = if is_dc {
            format!("dc:{}", metadata.property)
        } else {
            "meta".to_string()
        };

        writer.write_event(Event::Start(
            BytesStart::new(tag_name.as_str()).with_attributes(metadata.attributes(is_dc)),
        ))?;
        writer.write_event(Event::Text(BytesText::new(metadata.value.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new(tag_name.as_str())))?;

        // refinements need an id to point at
        let Some(id) = &metadata.id else { continue };
        let refines = format!("#{}", id);
        for refinement in &metadata.refined {
            writer.write_event(Event::Start(
                BytesStart::new("meta").with_attributes(refinement.attributes(&refines)),
            ))?;
            writer.write_event(Event::Text(BytesText::new(refinement.value.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("meta")))?;
        }
    }

    if let Some(cover) = &model.cover {
        writer.write_event(Event::Empty(
            BytesStart::new("meta").with_attributes([("name", "cover"), ("content", cover.as_str())]),
        ))?;
    }

    writer.write_event(Event::End(BytesEnd::new("metadata")))?;

    Ok(())
}

fn make_opf_manifest(
    writer: &mut XmlWriter,
    manifest: &IndexMap<String, ManifestItem>,
) -> Result<(), EpubError> {
    writer.write_event(Event::Start(BytesStart::new("manifest")))?;

    for manifest in manifest.values() {
        writer.write_event(Event::Empty(
            BytesStart::new("item").with_attributes(manifest.attributes()),
        ))?;
    }

    writer.write_event(Event::End(BytesEnd::new("manifest")))?;

    Ok(())
}

fn make_opf_spine(writer: &mut XmlWriter, model: &PackageModel) -> Result<(), EpubError> {
    let mut spine = BytesStart::new("spine").with_attributes([("toc", model.ncx.id.as_str())]);
    if let Some(direction) = model.page_progression {
        spine.push_attribute(("page-progression-direction", direction.as_str()));
    }
    writer.write_event(Event::Start(spine))?;

    for spine in &model.spine {
        writer.write_event(Event::Empty(
            BytesStart::new("itemref").with_attributes(spine.attributes()),
        ))?;
    }

    writer.write_event(Event::End(BytesEnd::new("spine")))?;

    Ok(())
}

/// Creates the navigation document
///
/// The body holds a nested list that mirrors the section tree. The number of
/// listed entries is checked against the spine before the document is returned.
pub(crate) fn navigation_document(model: &PackageModel) -> Result<Vec<u8>, EpubError> {
    let mut writer = xml_writer();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("html").with_attributes([
        ("xmlns", "http://www.w3.org/1999/xhtml"),
        ("xmlns:epub", "http://www.idpf.org/2007/ops"),
        ("xml:lang", model.language.as_str()),
        ("lang", model.language.as_str()),
    ])))?;

    // make head
    writer.write_event(Event::Start(BytesStart::new("head")))?;
    writer.write_event(Event::Start(BytesStart::new("title")))?;
    writer.write_event(Event::Text(BytesText::new(&model.title)))?;
    writer.write_event(Event::End(BytesEnd::new("title")))?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    // make body
    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Start(
        BytesStart::new("nav").with_attributes([("epub:type", "toc")]),
    ))?;

    writer.write_event(Event::Start(BytesStart::new("h1")))?;
    writer.write_event(Event::Text(BytesText::new(&model.title)))?;
    writer.write_event(Event::End(BytesEnd::new("h1")))?;

    let listed = make_nav(&mut writer, &listed_entries(model))?;

    writer.write_event(Event::End(BytesEnd::new("nav")))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;

    // the entry standing in for an empty book is not a section
    let sections = if model.toc.is_empty() { 0 } else { listed };
    if sections != model.spine.len() {
        return Err(RenderError::NavigationSpineMismatch {
            navigation: sections,
            spine: model.spine.len(),
        }
        .into());
    }

    Ok(writer.into_inner().into_inner())
}

/// Entries listed by the navigation document and the NCX
///
/// Both formats require at least one entry, so a book without sections lists
/// the navigation document itself, labelled with the book title.
fn listed_entries(model: &PackageModel) -> Vec<TocEntry> {
    if !model.toc.is_empty() {
        return model.toc.clone();
    }

    vec![TocEntry {
        depth: 0,
        id: model.nav.id.clone(),
        path: model.nav.path.clone(),
        label: model.title.clone(),
    }]
}

/// Write one level of the navigation list
///
/// `entries` starts with an entry of the current level; every entry deeper
/// than its predecessor's level belongs to that predecessor's sub-list.
/// Returns the number of list items written, nested items included.
fn make_nav(writer: &mut XmlWriter, entries: &[TocEntry]) -> Result<usize, EpubError> {
    writer.write_event(Event::Start(BytesStart::new("ol")))?;

    let mut written = 0;
    let mut index = 0;
    while index < entries.len() {
        let entry = &entries[index];

        writer.write_event(Event::Start(BytesStart::new("li")))?;
        writer.write_event(Event::Start(
            BytesStart::new("a").with_attributes([("href", relative_href("", &entry.path).as_str())]),
        ))?;
        writer.write_event(Event::Text(BytesText::new(entry.label.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("a")))?;

        let children = entries[index + 1..]
            .iter()
            .take_while(|child| child.depth > entry.depth)
            .count();
        if children > 0 {
            written += make_nav(writer, &entries[index + 1..index + 1 + children])?;
        }

        writer.write_event(Event::End(BytesEnd::new("li")))?;

        written += 1;
        index += 1 + children;
    }

    writer.write_event(Event::End(BytesEnd::new("ol")))?;

    Ok(written)
}

/// Creates the legacy `toc.ncx` file
///
/// Older reading systems ignore the navigation document, so the same entries
/// are listed here once more, flattened into a single level.
pub(crate) fn ncx_document(model: &PackageModel) -> Result<Vec<u8>, EpubError> {
    let mut writer = xml_writer();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("ncx").with_attributes([
        ("xmlns", "http://www.daisy.org/z3986/2005/ncx/"),
        ("version", "2005-1"),
    ])))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    writer.write_event(Event::Empty(BytesStart::new("meta").with_attributes([
        ("name", "dtb:uid"),
        ("content", model.identifier.as_str()),
    ])))?;
    // the list below is always flat
    for (name, content) in [
        ("dtb:depth", "1"),
        ("dtb:totalPageCount", "0"),
        ("dtb:maxPageNumber", "0"),
    ] {
        writer.write_event(Event::Empty(
            BytesStart::new("meta").with_attributes([("name", name), ("content", content)]),
        ))?;
    }
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("docTitle")))?;
    writer.write_event(Event::Start(BytesStart::new("text")))?;
    writer.write_event(Event::Text(BytesText::new(&model.title)))?;
    writer.write_event(Event::End(BytesEnd::new("text")))?;
    writer.write_event(Event::End(BytesEnd::new("docTitle")))?;

    writer.write_event(Event::Start(BytesStart::new("navMap")))?;
    for (index, entry) in listed_entries(model).iter().enumerate() {
        let nav_id = format!("navPoint-{}", index + 1);
        let play_order = (index + 1).to_string();

        writer.write_event(Event::Start(BytesStart::new("navPoint").with_attributes([
            ("id", nav_id.as_str()),
            ("playOrder", play_order.as_str()),
        ])))?;
        writer.write_event(Event::Start(BytesStart::new("navLabel")))?;
        writer.write_event(Event::Start(BytesStart::new("text")))?;
        writer.write_event(Event::Text(BytesText::new(entry.label.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("text")))?;
        writer.write_event(Event::End(BytesEnd::new("navLabel")))?;
        writer.write_event(Event::Empty(
            BytesStart::new("content").with_attributes([("src", entry.path.as_str())]),
        ))?;
        writer.write_event(Event::End(BytesEnd::new("navPoint")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("navMap")))?;

    writer.write_event(Event::End(BytesEnd::new("ncx")))?;

    Ok(writer.into_inner().into_inner())
}

/// Wrap a section body in a minimal XHTML document
///
/// The body fragment is written as-is, it is neither parsed nor escaped.
pub(crate) fn section_document(
    model: &PackageModel,
    section: &SectionDocument,
) -> Result<Vec<u8>, EpubError> {
    let folder = section
        .path
        .rsplit_once('/')
        .map(|(folder, _)| folder)
        .unwrap_or("");
    let title = section.title.as_deref().unwrap_or(&model.title);

    let mut writer = xml_writer();

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("html").with_attributes([
        ("xmlns", "http://www.w3.org/1999/xhtml"),
        ("xmlns:epub", "http://www.idpf.org/2007/ops"),
        ("xml:lang", model.language.as_str()),
        ("lang", model.language.as_str()),
    ])))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    writer.write_event(Event::Start(BytesStart::new("title")))?;
    writer.write_event(Event::Text(BytesText::new(title)))?;
    writer.write_event(Event::End(BytesEnd::new("title")))?;
    for stylesheet in &section.stylesheets {
        let href = relative_href(folder, stylesheet);
        writer.write_event(Event::Empty(BytesStart::new("link").with_attributes([
            ("rel", "stylesheet"),
            ("type", "text/css"),
            ("href", href.as_str()),
        ])))?;
    }
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    writer.write_event(Event::Text(BytesText::from_escaped(section.body.as_str())))?;
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("html")))?;

    Ok(writer.into_inner().into_inner())
}

fn validate_manifest(manifest: &IndexMap<String, ManifestItem>) -> Result<(), EpubError> {
    let mut paths = HashSet::new();

    for item in manifest.values() {
        if !is_xml_name(&item.id) {
            return Err(RenderError::InvalidManifestId { id: item.id.clone() }.into());
        }
        if !paths.insert(item.path.as_str()) {
            return Err(RenderError::DuplicateManifestPath {
                path: item.path.clone(),
            }
            .into());
        }
        if !is_supported_media_type(item.kind, &item.mime) {
            return Err(ResourceError::UnsupportedMediaType {
                id: item.id.clone(),
                media_type: item.mime.clone(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_spine(model: &PackageModel) -> Result<(), EpubError> {
    for item in &model.spine {
        if !model.manifest.contains_key(&item.idref) {
            return Err(RenderError::MissingManifestItem {
                id: item.idref.clone(),
            }
            .into());
        }
    }

    if model.spine.len() != model.toc.len() {
        return Err(RenderError::NavigationSpineMismatch {
            navigation: model.toc.len(),
            spine: model.spine.len(),
        }
        .into());
    }

    Ok(())
}
