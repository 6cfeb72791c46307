use super::{Document, Splitter};
use crate::types::{meta_keys, Fragment};

/// PDF loader (§4.1). `pdf_extract` separates pages with a form-feed
/// character (`\x0C`); the Ingestor's PDF loader hands this splitter the raw
/// extracted text unmodified, and exactly one fragment is produced per page,
/// with no further splitting regardless of page length.
pub struct PdfLoader;

impl Splitter for PdfLoader {
    fn split(&self, document: &Document) -> Vec<Fragment> {
        document
            .content
            .split('\x0C')
            .map(str::trim)
            .filter(|page| !page.is_empty())
            .map(|page| {
                let mut fragment = Fragment::new(page.to_string());
                fragment.metadata = document.metadata.clone();
                fragment
                    .metadata
                    .insert(meta_keys::CHUNK_TYPE.to_string(), "pdf_page".to_string());
                fragment
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_fragment_per_page() {
        let content = "page one content\x0Cpage two content\x0Cpage three content";
        let doc = Document::new(content, "/docs/spec.pdf", "pdf");
        let fragments = PdfLoader.split(&doc);
        assert_eq!(fragments.len(), 3);
        for fragment in &fragments {
            assert_eq!(fragment.chunk_type(), "pdf_page");
        }
        assert_eq!(fragments[1].content, "page two content");
    }

    #[test]
    fn blank_pages_are_dropped() {
        let content = "real content\x0C   \x0C\x0Cmore content";
        let doc = Document::new(content, "/docs/spec.pdf", "pdf");
        let fragments = PdfLoader.split(&doc);
        assert_eq!(fragments.len(), 2);
    }
}
