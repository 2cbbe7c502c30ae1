use crate::error::ExtractionError;
use crate::models::{DocumentKind, SourceDocument};
use lopdf::Document;
use std::path::Path;

const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// `path` names the source in errors; the document is parsed from `bytes`.
    fn extract_pages(&self, path: &Path, bytes: &[u8])
        -> Result<Vec<PageText>, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(
        &self,
        path: &Path,
        bytes: &[u8],
    ) -> Result<Vec<PageText>, ExtractionError> {
        let document = Document::load_mem(bytes).map_err(|error| pdf_error(path, error))?;

        // get_pages is a BTreeMap keyed by page number, so iteration is in page order
        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| pdf_error(path, error))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

fn pdf_error(path: &Path, error: lopdf::Error) -> ExtractionError {
    ExtractionError::PdfParse {
        path: path.display().to_string(),
        details: error.to_string(),
    }
}

/// Concatenates page texts in page order with a blank line between pages.
/// Pages without text still contribute their (empty) slot.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

pub fn read_source(path: &Path) -> Result<Vec<u8>, ExtractionError> {
    std::fs::read(path).map_err(|source| ExtractionError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String, ExtractionError> {
    String::from_utf8(bytes).map_err(|error| ExtractionError::InvalidUtf8 {
        path: path.display().to_string(),
        offset: error.utf8_error().valid_up_to(),
    })
}

pub fn extract_text(document: &SourceDocument) -> Result<String, ExtractionError> {
    let bytes = read_source(&document.path)?;
    extract_text_with(&LopdfExtractor, document, bytes)
}

/// Extracts from bytes already read from `document.path`.
pub fn extract_text_with<P: PdfExtractor>(
    pdf: &P,
    document: &SourceDocument,
    bytes: Vec<u8>,
) -> Result<String, ExtractionError> {
    match document.kind {
        DocumentKind::Pdf => {
            let pages = pdf.extract_pages(&document.path, &bytes)?;
            Ok(join_pages(&pages))
        }
        DocumentKind::Text => decode_text(&document.path, bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct FixedPages(Vec<PageText>);

    impl PdfExtractor for FixedPages {
        fn extract_pages(
            &self,
            _path: &Path,
            _bytes: &[u8],
        ) -> Result<Vec<PageText>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn pages_are_joined_with_blank_lines() {
        let pages = vec![page(1, "first"), page(2, ""), page(3, "third")];
        assert_eq!(join_pages(&pages), "first\n\n\n\nthird");
    }

    #[test]
    fn pdf_documents_use_page_extractor() -> Result<(), Box<dyn std::error::Error>> {
        let document = SourceDocument::new("/tmp/x.pdf", "x.pdf", DocumentKind::Pdf);
        let extractor = FixedPages(vec![page(1, "alpha"), page(2, "beta")]);

        let text = extract_text_with(&extractor, &document, b"%PDF-1.4".to_vec())?;
        assert_eq!(text, "alpha\n\nbeta");
        Ok(())
    }

    #[test]
    fn text_is_decoded_from_bytes_without_touching_the_path() -> Result<(), ExtractionError> {
        let document = SourceDocument::new("/nonexistent/נעלם.txt", "נעלם.txt", DocumentKind::Text);

        let bytes = "שלום".as_bytes().to_vec();
        let text = extract_text_with(&LopdfExtractor, &document, bytes)?;
        assert_eq!(text, "שלום");
        Ok(())
    }

    #[test]
    fn text_files_are_read_as_utf8() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("הערות.txt");
        fs::write(&path, "שורה ראשונה\nsecond line")?;

        let document = SourceDocument::from_path(&path)?;
        assert_eq!(extract_text(&document)?, "שורה ראשונה\nsecond line");
        Ok(())
    }

    #[test]
    fn undecodable_text_is_an_extraction_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.txt");
        fs::write(&path, [b'o', b'k', 0xff, 0xfe])?;

        let result = extract_text(&SourceDocument::from_path(&path)?);
        assert!(matches!(
            result,
            Err(ExtractionError::InvalidUtf8 { offset: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn broken_pdf_is_an_extraction_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = extract_text(&SourceDocument::from_path(&path)?);
        assert!(matches!(result, Err(ExtractionError::PdfParse { .. })));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let document = SourceDocument::new("/nonexistent/a.txt", "a.txt", DocumentKind::Text);
        assert!(matches!(
            extract_text(&document),
            Err(ExtractionError::Io { .. })
        ));
    }
}
