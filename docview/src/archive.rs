//! Extraction of a .docx file into a browsable archive
//!
//! The archive holds `index.html` at its root and every embedded image under
//! `images/`, named `img001.png`, `img002.jpg`, ... in document order.

use crate::docx::{ConvertError, DocxConverter, EmbeddedImage, NO_CONTENT};
use crate::page::escape_html;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Name of the page at the archive root
pub const INDEX_FILE: &str = "index.html";

/// Directory holding extracted images
pub const IMAGES_DIR: &str = "images";

/// Errors that can occur while extracting a document
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("{0} is not a .docx file")]
    UnsupportedFile(String),

    #[error("conversion failed: {0}")]
    Convert(#[from] ConvertError),

    #[error("failed to build archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File stem of a `.docx` name (case-insensitive), or `None` for other files
pub fn docx_stem(name: &str) -> Option<&str> {
    const EXTENSION: &str = ".docx";

    let file_name = Path::new(name).file_name()?.to_str()?;
    let split = file_name.len().checked_sub(EXTENSION.len())?;
    let stem = file_name.get(..split)?;
    let extension = file_name.get(split..)?;
    extension.eq_ignore_ascii_case(EXTENSION).then_some(stem)
}

/// Default archive file name for a document: its stem plus `.zip`
pub fn archive_name(name: &str) -> Option<String> {
    docx_stem(name).map(|stem| format!("{}.zip", stem))
}

/// File extension for an image media type
pub fn extension_for(media_type: &str) -> &'static str {
    match media_type.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        _ => "png",
    }
}

/// Archive path of the `index`-th (1-based) image
fn image_path(index: usize, image: &EmbeddedImage) -> String {
    format!(
        "{}/img{:03}.{}",
        IMAGES_DIR,
        index,
        extension_for(&image.content_type)
    )
}

/// Convert a .docx file and package it as a zip archive
///
/// # Parameters
/// * `name` - File name of the document; must end in `.docx`
/// * `bytes` - Contents of the document
/// * `converter` - Converter used to render the document
///
/// # Returns
/// * `Ok(Vec<u8>)` - The zip archive
/// * `Err(ArchiveError)` - The file was rejected or could not be converted;
///   no archive is produced
pub fn extract_to_archive(
    name: &str,
    bytes: &[u8],
    converter: &DocxConverter,
) -> Result<Vec<u8>, ArchiveError> {
    let title = docx_stem(name).ok_or_else(|| ArchiveError::UnsupportedFile(name.to_string()))?;

    let mut image_paths = Vec::new();
    let converted = converter.convert(bytes, &mut |image: &EmbeddedImage| {
        let path = image_path(image_paths.len() + 1, image);
        image_paths.push(path.clone());
        path
    })?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.add_directory(IMAGES_DIR, options)?;
    for (path, image) in image_paths.iter().zip(&converted.images) {
        writer.start_file(path.as_str(), options)?;
        writer.write_all(&image.data)?;
    }

    writer.start_file(INDEX_FILE, options)?;
    writer.write_all(standalone_page(title, &converted.html).as_bytes())?;

    let archive = writer.finish()?.into_inner();
    log::info!(
        "Extracted {} with {} images ({} bytes)",
        name,
        image_paths.len(),
        archive.len()
    );
    Ok(archive)
}

/// Wrap converted markup in a page that can be opened on its own
pub fn standalone_page(title: &str, body: &str) -> String {
    let mut output = String::new();

    output.push_str("<!DOCTYPE html>\n");
    output.push_str("<html lang=\"en\">\n");
    output.push_str("<head>\n");
    output.push_str("<meta charset=\"UTF-8\">\n");
    output.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    output.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    output.push_str("<style>\n");
    output.push_str(ARCHIVE_CSS);
    output.push_str("</style>\n");
    output.push_str("</head>\n");
    output.push_str("<body>\n");
    if body.trim().is_empty() {
        output.push_str(NO_CONTENT);
    } else {
        output.push_str(body);
    }
    output.push_str("\n</body>\n");
    output.push_str("</html>\n");

    output
}

/// Write an archive to disk
///
/// The bytes go to a temporary sibling first and are renamed into place, so a
/// failed write never leaves a partial archive at `path`.
pub fn write_archive(path: &Path, bytes: &[u8]) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp = temp_path(path);
    if let Err(e) = fs::write(&temp, bytes).and_then(|()| fs::rename(&temp, path)) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }

    log::debug!("Wrote archive {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

const ARCHIVE_CSS: &str = r#"
body {
    max-width: 900px;
    margin: 24px auto;
    font-family: system-ui, -apple-system, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
    line-height: 1.75;
    color: #111827;
}
h1 { font-size: 28px; margin: 0 0 16px; }
h2 { font-size: 22px; margin-top: 28px; color: #1d4ed8; }
h3 { font-size: 18px; margin-top: 20px; color: #2563eb; }
p { color: #374151; }
img { max-width: 100%; height: auto; }
table { border-collapse: collapse; }
td { border: 1px solid #d1d5db; padding: 4px 8px; vertical-align: top; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures;
    use std::io::Read;
    use zip::ZipArchive;

    fn entries(archive: &[u8]) -> Vec<String> {
        let zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        zip.file_names().map(str::to_string).collect()
    }

    fn read_entry(archive: &[u8], name: &str) -> Vec<u8> {
        let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut file = zip.by_name(name).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        data
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/jpg"), "jpg");
        assert_eq!(extension_for("image/gif"), "gif");
        assert_eq!(extension_for("image/svg+xml"), "svg");
        assert_eq!(extension_for("image/bmp"), "bmp");
        assert_eq!(extension_for("image/x-emf"), "png");
        assert_eq!(extension_for(""), "png");
    }

    #[test]
    fn test_docx_stem() {
        assert_eq!(docx_stem("Report.docx"), Some("Report"));
        assert_eq!(docx_stem("dir/Notes.DOCX"), Some("Notes"));
        assert_eq!(docx_stem("notes.doc"), None);
        assert_eq!(docx_stem("docx"), None);
        assert_eq!(archive_name("a/b/Plan.docx").as_deref(), Some("Plan.zip"));
    }

    #[test]
    fn test_rejects_other_files() {
        let err = extract_to_archive("notes.pdf", b"", &DocxConverter::new()).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFile(_)));
    }

    #[test]
    fn test_archive_layout() {
        let archive =
            extract_to_archive("Report.docx", &fixtures::illustrated_docx(), &DocxConverter::new())
                .unwrap();

        let names = entries(&archive);
        assert!(names.contains(&"index.html".to_string()));
        assert!(names.contains(&"images/img001.png".to_string()));
        assert!(names.contains(&"images/img002.jpg".to_string()));
        assert_eq!(read_entry(&archive, "images/img001.png"), fixtures::PNG);

        let index = String::from_utf8(read_entry(&archive, INDEX_FILE)).unwrap();
        assert!(index.contains("<title>Report</title>"));
        assert!(index.contains("<h1>Report</h1>"));
        assert!(index.contains("src=\"images/img001.png\""));
        assert!(index.contains("src=\"images/img002.jpg\""));
    }

    #[test]
    fn test_empty_document_gets_placeholder() {
        let archive = extract_to_archive(
            "empty.docx",
            &fixtures::simple_docx("<w:p/>"),
            &DocxConverter::new(),
        )
        .unwrap();
        let index = String::from_utf8(read_entry(&archive, INDEX_FILE)).unwrap();
        assert!(index.contains(NO_CONTENT));
        assert!(!entries(&archive).iter().any(|n| n.starts_with("images/img")));
    }

    #[test]
    fn test_conversion_failure_produces_no_archive() {
        let err = extract_to_archive("bad.docx", b"not a zip", &DocxConverter::new()).unwrap_err();
        assert!(matches!(err, ArchiveError::Convert(_)));
    }

    #[test]
    fn test_title_is_escaped() {
        let page = standalone_page("a<b>", "<p>x</p>");
        assert!(page.contains("<title>a&lt;b&gt;</title>"));
        assert!(page.contains("<p>x</p>"));
    }

    #[test]
    fn test_write_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("Report.zip");
        write_archive(&path, b"zip bytes").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"zip bytes");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(write_archive(&path, b"zip bytes").is_err());
        assert!(path.is_dir());
        assert!(!temp_path(&path).exists());
    }
}
