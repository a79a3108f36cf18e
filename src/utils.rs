use std::{io::Cursor, path::Path};

use chrono::Local;
use quick_xml::Writer;
use sha1::{Digest, Sha1};

use crate::types::ItemKind;

pub(crate) type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Name of the mimetype marker file at the package root
pub const MIMETYPE_FILE: &str = "mimetype";

/// Content of the mimetype marker, without any trailing newline
pub const EPUB_MIMETYPE: &str = "application/epub+zip";

/// Folder holding the container descriptor
pub const META_INF_FOLDER: &str = "META-INF";

/// Folder holding the package document, navigation and every resource
pub const CONTENT_ROOT: &str = "EPUB";

pub const PACKAGE_FILE: &str = "package.opf";

pub static ELEMENT_IN_DC_NAMESPACE: std::sync::LazyLock<Vec<&str>> =
    std::sync::LazyLock::new(|| {
        vec![
            "contributor",
            "coverage",
            "creator",
            "date",
            "description",
            "format",
            "identifier",
            "language",
            "publisher",
            "relation",
            "rights",
            "source",
            "subject",
            "title",
            "type",
        ]
    });

/// Returns the current time with custom format
pub fn local_time() -> String {
    Local::now().format("%Y-%m-%dT%H-%M-%S.%fU%z").to_string()
}

/// Create an XML writer that indents nested elements with two spaces
pub(crate) fn xml_writer() -> XmlWriter {
    Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
}

/// Checks whether `name` can be used as an XML id
///
/// Manifest ids are referenced from the spine and must be valid
/// non-colonized XML names.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

/// Compute the href of `target` as seen from a document stored in `from_dir`
///
/// Both arguments are `/` separated and relative to the content root.
pub fn relative_href(from_dir: &str, target: &str) -> String {
    let from = from_dir
        .split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>();
    let to = target.split('/').collect::<Vec<&str>>();

    // the last component of the target is the file name, never shared
    let shared = from
        .iter()
        .zip(to.iter().take(to.len().saturating_sub(1)))
        .take_while(|(left, right)| left == right)
        .count();

    let mut parts = vec![".."; from.len() - shared];
    parts.extend(&to[shared..]);
    parts.join("/")
}

/// Lowercase extension of a file name, if any
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Hex encoded SHA-1 digest of `data`
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Refine the mime type
///
/// Optimize mime types inferred from file content based on file extensions
pub fn refine_mime_type(infer_mime: &str, extension: &str) -> String {
    match (infer_mime, extension) {
        ("text/xml", "xhtml")
        | ("application/xml", "xhtml")
        | ("text/xml", "xht")
        | ("application/xml", "xht") => "application/xhtml+xml".to_string(),

        ("text/xml", "svg") | ("application/xml", "svg") => "image/svg+xml".to_string(),

        ("application/font-sfnt", "ttf") => "font/ttf".to_string(),
        ("application/font-sfnt", "otf") => "font/otf".to_string(),
        ("application/font-woff", "woff") => "font/woff".to_string(),
        ("application/font-woff", "woff2") => "font/woff2".to_string(),

        ("text/plain", "css") => "text/css".to_string(),
        ("text/plain", "svg") => "image/svg+xml".to_string(),

        _ => infer_mime.to_string(),
    }
}

/// Media type conventionally used for a file extension
pub fn mime_from_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "css" => Some("text/css"),
        "gif" => Some("image/gif"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        "ttf" => Some("font/ttf"),
        "otf" => Some("font/otf"),
        "woff" => Some("font/woff"),
        "woff2" => Some("font/woff2"),
        "xhtml" => Some("application/xhtml+xml"),
        _ => None,
    }
}

/// File extension conventionally used for a media type
pub fn extension_from_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "text/css" => Some("css"),
        "image/gif" => Some("gif"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/svg+xml" => Some("svg"),
        "image/webp" => Some("webp"),
        "font/ttf" | "application/font-sfnt" => Some("ttf"),
        "font/otf" | "application/vnd.ms-opentype" => Some("otf"),
        "font/woff" | "application/font-woff" => Some("woff"),
        "font/woff2" => Some("woff2"),
        _ => None,
    }
}

/// Checks whether `mime` is a core media type for items of `kind`
pub fn is_supported_media_type(kind: ItemKind, mime: &str) -> bool {
    match kind {
        ItemKind::Image | ItemKind::Cover => matches!(
            mime,
            "image/gif" | "image/jpeg" | "image/png" | "image/svg+xml" | "image/webp"
        ),
        ItemKind::Font => matches!(
            mime,
            "font/ttf"
                | "font/otf"
                | "font/woff"
                | "font/woff2"
                | "application/font-sfnt"
                | "application/font-woff"
                | "application/vnd.ms-opentype"
        ),
        ItemKind::Stylesheet => mime == "text/css",
        ItemKind::Section | ItemKind::Navigation => mime == "application/xhtml+xml",
        ItemKind::Ncx => mime == "application/x-dtbncx+xml",
    }
}
