//! Production text source and the document-level extractor.

use std::path::Path;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{NumscanError, PdfError, SourceError};
#[cfg(feature = "native")]
use crate::models::{ModelConfig, OcrConfig};
use crate::models::{NumscanConfig, PdfConfig};
use crate::number::rules::TemplateSpec;
use crate::number::{ExtractionPipeline, ResultSet};
use crate::ocr::OcrEngine;
use crate::pdf::{PdfExtractor, PdfProcessor};

use super::{DocumentKind, SourceCapabilities, TextSource};

/// Reads PDFs through their text layer, falling back to OCR for scans and images.
pub struct DocumentTextSource {
    pdf: PdfConfig,
    #[cfg(feature = "native")]
    ocr: OcrConfig,
    #[cfg(feature = "native")]
    models: ModelConfig,
    engine: Option<Box<dyn OcrEngine>>,
}

impl DocumentTextSource {
    /// A source without OCR: text files and text-layer PDFs only.
    pub fn new() -> Self {
        Self {
            pdf: PdfConfig::default(),
            #[cfg(feature = "native")]
            ocr: OcrConfig::default(),
            #[cfg(feature = "native")]
            models: ModelConfig::default(),
            engine: None,
        }
    }

    /// Build from configuration, loading OCR models from `models.model_dir`.
    pub fn from_config(config: &NumscanConfig) -> Self {
        let source = Self {
            pdf: config.pdf.clone(),
            #[cfg(feature = "native")]
            ocr: config.ocr.clone(),
            #[cfg(feature = "native")]
            models: config.models.clone(),
            engine: None,
        };
        source.with_ocr_dir(&config.models.model_dir)
    }

    /// Set PDF handling options.
    pub fn with_pdf_config(mut self, pdf: PdfConfig) -> Self {
        self.pdf = pdf;
        self
    }

    /// Try to load the OCR models from `model_dir`.
    ///
    /// OCR availability is decided here, once. A failure is logged and the
    /// source keeps working for inputs that do not need OCR.
    #[cfg(feature = "native")]
    pub fn with_ocr_dir(mut self, model_dir: impl AsRef<Path>) -> Self {
        let model_dir = model_dir.as_ref();
        match crate::ocr::PureOcrEngine::from_dir(model_dir, &self.models, self.ocr.clone()) {
            Ok(engine) => self.engine = Some(Box::new(engine)),
            Err(e) => warn!("OCR disabled: {}", e),
        }
        self
    }

    /// Try to load the OCR models from `model_dir`.
    ///
    /// Built without the `native` feature, so OCR stays unavailable.
    #[cfg(not(feature = "native"))]
    pub fn with_ocr_dir(self, model_dir: impl AsRef<Path>) -> Self {
        warn!(
            "OCR disabled: built without native OCR support, ignoring {}",
            model_dir.as_ref().display()
        );
        self
    }

    /// Use an already constructed OCR engine.
    pub fn with_engine(mut self, engine: impl OcrEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    fn engine(&self) -> Result<&dyn OcrEngine, SourceError> {
        self.engine.as_deref().ok_or(SourceError::OcrUnavailable)
    }

    fn recognize(
        &self,
        engine: &dyn OcrEngine,
        image: &DynamicImage,
    ) -> Result<String, SourceError> {
        // Grayscale before recognition, as for standalone images
        let gray = DynamicImage::ImageLuma8(image.to_luma8());
        Ok(engine.extract_text(&gray)?)
    }

    fn pdf_text(&self, data: &[u8]) -> Result<String, SourceError> {
        let mut pdf = PdfExtractor::new().with_min_text_length(self.pdf.min_text_length);
        pdf.load(data)?;

        let embedded = if self.pdf.prefer_embedded_text {
            match pdf.extract_text() {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Embedded PDF text unreadable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(text) = &embedded {
            let len = text.trim().chars().count();
            if len > 0 && len >= self.pdf.min_text_length {
                debug!("Using embedded PDF text ({} chars)", len);
                return Ok(text.clone());
            }
            debug!("Embedded PDF text too short ({} chars), trying OCR", len);
        }

        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(unavailable) => {
                // Short but non-blank text beats no text at all
                return match embedded.filter(|text| !text.trim().is_empty()) {
                    Some(text) => {
                        warn!("OCR unavailable, using short embedded PDF text");
                        Ok(text)
                    }
                    None => Err(unavailable),
                };
            }
        };

        let page_limit = match self.pdf.max_pages {
            0 => pdf.page_count(),
            max => pdf.page_count().min(max as u32),
        };

        let mut images = Vec::new();
        for page in 1..=page_limit {
            images.extend(pdf.page_images(page)?);
        }
        if images.is_empty() {
            images = pdf.document_images();
        }
        if images.is_empty() {
            let reason = "no text layer and no page images".to_string();
            return Err(PdfError::TextExtraction(reason).into());
        }

        info!("Running OCR on {} PDF page image(s)", images.len());
        let pages = images
            .iter()
            .map(|image| self.recognize(engine, image))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages.join("\n"))
    }

    fn image_text(&self, data: &[u8]) -> Result<String, SourceError> {
        let engine = self.engine()?;
        let image = image::load_from_memory(data)?;
        debug!("Decoded image {}x{}", image.width(), image.height());
        self.recognize(engine, &image)
    }
}

impl Default for DocumentTextSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSource for DocumentTextSource {
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            embedded_pdf_text: true,
            ocr: self.engine.is_some(),
        }
    }

    fn extract_text(&self, data: &[u8], kind: DocumentKind) -> Result<String, SourceError> {
        debug!("Reading {:?} document ({} bytes)", kind, data.len());
        match kind {
            DocumentKind::Pdf => self.pdf_text(data),
            DocumentKind::Image => self.image_text(data),
            DocumentKind::Text => String::from_utf8(data.to_vec())
                .map_err(|e| SourceError::Decode(e.to_string())),
        }
    }
}

/// Runs the number pipeline over documents read by a [`TextSource`].
pub struct DocumentExtractor<S> {
    source: S,
    pipeline: ExtractionPipeline,
}

impl<S: TextSource> DocumentExtractor<S> {
    pub fn new(source: S, pipeline: ExtractionPipeline) -> Self {
        Self { source, pipeline }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pipeline(&self) -> &ExtractionPipeline {
        &self.pipeline
    }

    /// Extract numbers from a document.
    ///
    /// The template is compiled before the document is read. `Err(Source)`
    /// means the document could not be read; an empty result set means
    /// nothing matched.
    pub fn extract_document(
        &self,
        data: &[u8],
        kind: DocumentKind,
        spec: &TemplateSpec,
    ) -> Result<ResultSet, NumscanError> {
        let matcher = self.pipeline.compile(spec)?;
        let text = self.source.extract_text(data, kind)?;
        Ok(self.pipeline.run_with(&matcher, &text))
    }

    /// Read a file and extract numbers from it.
    pub fn extract_file(
        &self,
        path: &Path,
        spec: &TemplateSpec,
    ) -> Result<ResultSet, NumscanError> {
        let kind = DocumentKind::from_path(path)?;
        let data = std::fs::read(path)?;
        info!("Processing {} ({:?})", path.display(), kind);
        self.extract_document(&data, kind, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::number::PipelineConfig;
    use crate::ocr::OcrResult;
    use crate::pdf::testing::text_pdf;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::io::Cursor;

    /// OCR engine that "recognizes" a fixed string.
    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn process(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
            let mut result = OcrResult::empty(image.width(), image.height());
            result.text = self.0.to_string();
            Ok(result)
        }
    }

    /// Text source returning canned text and counting calls.
    struct StubSource {
        text: Option<&'static str>,
        calls: Cell<usize>,
    }

    impl StubSource {
        fn new(text: Option<&'static str>) -> Self {
            Self {
                text,
                calls: Cell::new(0),
            }
        }
    }

    impl TextSource for StubSource {
        fn capabilities(&self) -> SourceCapabilities {
            SourceCapabilities {
                embedded_pdf_text: false,
                ocr: false,
            }
        }

        fn extract_text(&self, _data: &[u8], _kind: DocumentKind) -> Result<String, SourceError> {
            self.calls.set(self.calls.get() + 1);
            self.text
                .map(str::to_string)
                .ok_or(SourceError::OcrUnavailable)
        }
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::new_rgb8(8, 8);
        let mut data = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        data
    }

    fn free_form() -> ExtractionPipeline {
        ExtractionPipeline::new(PipelineConfig::free_form()).unwrap()
    }

    #[test]
    fn test_capabilities() {
        let plain = DocumentTextSource::new();
        assert_eq!(
            plain.capabilities(),
            SourceCapabilities {
                embedded_pdf_text: true,
                ocr: false
            }
        );
        assert!(DocumentTextSource::new().with_engine(FixedOcr("")).capabilities().ocr);

        let empty_dir = tempfile::tempdir().unwrap();
        let missing_models = DocumentTextSource::new().with_ocr_dir(empty_dir.path());
        assert!(!missing_models.capabilities().ocr);
    }

    #[test]
    fn test_from_config_without_models() {
        let empty_dir = tempfile::tempdir().unwrap();
        let mut config = NumscanConfig::default();
        config.models.model_dir = empty_dir.path().to_path_buf();

        let source = DocumentTextSource::from_config(&config);
        assert!(!source.capabilities().ocr);
        assert_eq!(
            source.extract_text(b"ID 123-45-6789", DocumentKind::Text).unwrap(),
            "ID 123-45-6789"
        );
    }

    #[test]
    fn test_text_documents() {
        let source = DocumentTextSource::new();
        assert_eq!(
            source.extract_text(b"ID 123-45-6789", DocumentKind::Text).unwrap(),
            "ID 123-45-6789"
        );
        assert!(matches!(
            source.extract_text(&[0xff, 0xfe, 0x00], DocumentKind::Text),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn test_images_need_ocr() {
        let data = png_bytes();

        let without = DocumentTextSource::new();
        assert!(matches!(
            without.extract_text(&data, DocumentKind::Image),
            Err(SourceError::OcrUnavailable)
        ));

        let with = DocumentTextSource::new().with_engine(FixedOcr("No 123456 123 45"));
        assert_eq!(
            with.extract_text(&data, DocumentKind::Image).unwrap(),
            "No 123456 123 45"
        );
        assert!(matches!(
            with.extract_text(b"not an image", DocumentKind::Image),
            Err(SourceError::Image(_))
        ));
    }

    #[test]
    fn test_pdf_text_layer() {
        let source = DocumentTextSource::new();
        let text = source
            .extract_text(&text_pdf("Plate 123456 123 45"), DocumentKind::Pdf)
            .unwrap();
        assert!(text.contains("123456"), "unexpected text: {text:?}");

        assert!(matches!(
            source.extract_text(b"%PDF-garbage", DocumentKind::Pdf),
            Err(SourceError::Pdf(_))
        ));
    }

    #[test]
    fn test_short_pdf_text_without_ocr() {
        let source = DocumentTextSource::new().with_pdf_config(PdfConfig {
            min_text_length: 1000,
            ..PdfConfig::default()
        });
        // Too short to trust, but still returned when OCR is unavailable
        let text = source
            .extract_text(&text_pdf("ID 42"), DocumentKind::Pdf)
            .unwrap();
        assert!(text.contains("42"), "unexpected text: {text:?}");
    }

    #[test]
    fn test_document_extractor() {
        let source = StubSource::new(Some("SSN 123 - 45 - 6789"));
        let extractor = DocumentExtractor::new(source, free_form());
        let spec = TemplateSpec::placeholder("###-##-####");
        let result = extractor
            .extract_document(b"", DocumentKind::Text, &spec)
            .unwrap();
        assert_eq!(result.values(), vec!["123-45-6789"]);
        assert_eq!(extractor.source().calls.get(), 1);
    }

    #[test]
    fn test_read_failure_differs_from_no_match() {
        let spec = TemplateSpec::group_lengths("6-3-4");

        let failing = DocumentExtractor::new(StubSource::new(None), free_form());
        assert!(matches!(
            failing.extract_document(b"", DocumentKind::Image, &spec),
            Err(NumscanError::Source(SourceError::OcrUnavailable))
        ));

        let empty = DocumentExtractor::new(StubSource::new(Some("")), free_form());
        let result = empty.extract_document(b"", DocumentKind::Text, &spec).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_bad_template_skips_reading() {
        let extractor = DocumentExtractor::new(StubSource::new(Some("123")), free_form());
        let spec = TemplateSpec::placeholder("---");
        assert!(matches!(
            extractor.extract_document(b"", DocumentKind::Text, &spec),
            Err(NumscanError::Compile(_))
        ));
        assert_eq!(extractor.source().calls.get(), 0);
    }

    #[test]
    fn test_extract_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.txt");
        std::fs::write(&path, "Account: 123456-123-4567").unwrap();

        let extractor = DocumentExtractor::new(DocumentTextSource::new(), free_form());
        let result = extractor
            .extract_file(&path, &TemplateSpec::group_lengths("6-3-4"))
            .unwrap();
        assert_eq!(result.values(), vec!["123456-123-4567"]);

        let unsupported = dir.path().join("scan.docx");
        std::fs::write(&unsupported, "x").unwrap();
        assert!(matches!(
            extractor.extract_file(&unsupported, &TemplateSpec::group_lengths("6-3-4")),
            Err(NumscanError::Source(SourceError::UnsupportedType(_)))
        ));
    }
}
