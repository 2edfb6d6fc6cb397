//! WASM bindings for template-driven number extraction.
//!
//! The browser runs OCR itself and hands the text (or the recognized boxes)
//! to these bindings, which run the normalize, match, validate and dedupe
//! pipeline.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use numscan_core::number::rules::{similarity_ratio, DEFAULT_DUPLICATE_THRESHOLD};
use numscan_core::ocr::{OcrResult, TextBox};
use numscan_core::{
    compile_template, ExtractionPipeline, ExtractionPolicy, NormalizationPolicy, NumscanConfig,
    TemplateMode, TemplateSpec,
};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(to_js_error)
}

fn parse_mode(mode: &str) -> Result<TemplateMode, JsValue> {
    match mode {
        "placeholder" => Ok(TemplateMode::Placeholder),
        "group-lengths" | "group_lengths" => Ok(TemplateMode::GroupLengths),
        other => Err(JsValue::from_str(&format!("unknown template mode: {}", other))),
    }
}

/// Clean OCR noise from `text`.
///
/// `preserve_spacing` keeps whitespace between digits; `remap` maps letters
/// commonly misread for digits (O, I, Z, S, B, ...) to those digits.
#[wasm_bindgen]
pub fn normalize_text(text: &str, preserve_spacing: bool, remap: bool) -> String {
    let mut policy = if preserve_spacing {
        NormalizationPolicy::grouped()
    } else {
        NormalizationPolicy::free_form()
    };
    if remap {
        policy = policy.with_confusables(numscan_core::ConfusableMap::numeric());
    }
    policy.normalize(text)
}

/// Find numbers shaped like `template` in already normalized `text`.
///
/// `mode` is `"placeholder"` (`###-##-####`) or `"group-lengths"` (`6-3-4`).
/// Returns an array of matched strings.
#[wasm_bindgen]
pub fn extract_numbers(
    text: &str,
    template: &str,
    mode: &str,
    all: bool,
) -> Result<JsValue, JsValue> {
    let matcher = compile_template(template, parse_mode(mode)?).map_err(to_js_error)?;
    let policy = if all {
        ExtractionPolicy::All
    } else {
        ExtractionPolicy::FirstOnly
    };
    to_js(&numscan_core::extract_matches(&matcher, text, policy))
}

/// Canonical form of a plate-style identifier, or `undefined` if invalid.
#[wasm_bindgen]
pub fn format_identifier(candidate: &str) -> Option<String> {
    numscan_core::validate_identifier(candidate)
        .ok()
        .map(|m| m.formatted)
}

/// Validate a plate-style identifier, returning the digits, groups and
/// canonical form. Throws with the rejection reason.
#[wasm_bindgen]
pub fn validate_identifier(candidate: &str) -> Result<JsValue, JsValue> {
    let validated = numscan_core::validate_identifier(candidate).map_err(to_js_error)?;
    to_js(&validated)
}

/// Similarity of two strings in `0.0..=1.0`.
#[wasm_bindgen]
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_ratio(a, b)
}

/// Drop near-duplicates from an array of strings, keeping first occurrences.
///
/// `threshold` defaults to 0.92 when omitted.
#[wasm_bindgen]
pub fn dedupe_numbers(candidates: JsValue, threshold: Option<f64>) -> Result<JsValue, JsValue> {
    let candidates: Vec<String> =
        serde_wasm_bindgen::from_value(candidates).map_err(to_js_error)?;
    let threshold = threshold.unwrap_or(DEFAULT_DUPLICATE_THRESHOLD);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(JsValue::from_str("threshold must be within 0..=1"));
    }
    to_js(&numscan_core::dedupe(&candidates, threshold))
}

/// Full pipeline for browser use.
#[wasm_bindgen]
pub struct NumberExtractor {
    pipeline: ExtractionPipeline,
    mode: TemplateMode,
}

#[wasm_bindgen]
impl NumberExtractor {
    /// Create an extractor with default settings.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<NumberExtractor, JsValue> {
        Self::with_config(NumscanConfig::default())
    }

    /// Create an extractor from a JSON configuration, as written by
    /// `numscan config init`. Missing sections take their defaults.
    #[wasm_bindgen(js_name = fromConfigJson)]
    pub fn from_config_json(json: &str) -> Result<NumberExtractor, JsValue> {
        let config: NumscanConfig = serde_json::from_str(json).map_err(to_js_error)?;
        Self::with_config(config)
    }

    fn with_config(config: NumscanConfig) -> Result<NumberExtractor, JsValue> {
        config.validate().map_err(to_js_error)?;
        let pipeline = ExtractionPipeline::new(config.pipeline_config()).map_err(to_js_error)?;
        Ok(Self {
            pipeline,
            mode: config.template.mode,
        })
    }

    /// Template convention used by `extract`.
    #[wasm_bindgen(getter)]
    pub fn mode(&self) -> String {
        self.mode.to_string()
    }

    /// Set the template convention used by `extract`.
    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.mode = parse_mode(mode)?;
        Ok(())
    }

    /// Run the pipeline over raw text. Returns the full result set.
    #[wasm_bindgen]
    pub fn extract(&self, text: &str, template: &str) -> Result<JsValue, JsValue> {
        let spec = TemplateSpec {
            mode: self.mode,
            text: template.to_string(),
        };
        let results = self.pipeline.run(&spec, text).map_err(to_js_error)?;
        to_js(&results)
    }

    /// Run the pipeline and return the first match, if any.
    #[wasm_bindgen]
    pub fn extract_first(&self, text: &str, template: &str) -> Result<Option<String>, JsValue> {
        let spec = TemplateSpec {
            mode: self.mode,
            text: template.to_string(),
        };
        let results = self.pipeline.run(&spec, text).map_err(to_js_error)?;
        Ok(results.first().map(|m| m.text.clone()))
    }
}

/// OCR result from browser-side processing.
#[wasm_bindgen]
pub struct OcrResultJs {
    result: OcrResult,
}

#[wasm_bindgen]
impl OcrResultJs {
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            result: OcrResult::empty(width, height),
        }
    }

    /// Add a recognized text box.
    #[wasm_bindgen]
    #[allow(clippy::too_many_arguments)]
    pub fn add_box(
        &mut self,
        text: &str,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x3: f32,
        y3: f32,
        x4: f32,
        y4: f32,
        confidence: f32,
    ) {
        self.result.boxes.push(TextBox {
            bbox: [x1, y1, x2, y2, x3, y3, x4, y4],
            text: text.to_string(),
            confidence,
        });
    }

    /// Text of all boxes in reading order, one per line.
    #[wasm_bindgen]
    pub fn get_text(&mut self) -> String {
        self.result.sort_by_reading_order();
        self.result.text.clone()
    }

    /// Run `extractor` over the recognized text.
    #[wasm_bindgen]
    pub fn extract(
        &mut self,
        extractor: &NumberExtractor,
        template: &str,
    ) -> Result<JsValue, JsValue> {
        let text = self.get_text();
        extractor.extract(&text, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("123 - 45 - 6789", false, false), "123-45-6789");
        assert_eq!(normalize_text("O1Z3", false, true), "0123");
        assert_eq!(normalize_text("O1Z3", false, false), "O1Z3");
    }

    #[wasm_bindgen_test]
    fn test_format_identifier() {
        assert_eq!(
            format_identifier("1234561234 56").as_deref(),
            Some("123456 123 56")
        );
        assert_eq!(format_identifier("12"), None);
    }

    #[wasm_bindgen_test]
    fn test_similarity() {
        let ratio = similarity("123456 123 45", "123456 123 46");
        assert!((ratio - 24.0 / 26.0).abs() < 1e-12);
    }

    #[wasm_bindgen_test]
    fn test_number_extractor() {
        let mut extractor = NumberExtractor::new().unwrap();
        assert_eq!(extractor.mode(), "group-lengths");

        let found = extractor
            .extract_first("Ref: 123 - 45 - 6789", "3-2-4")
            .unwrap();
        assert_eq!(found.as_deref(), Some("123-45-6789"));

        extractor.set_mode("placeholder").unwrap();
        let found = extractor
            .extract_first("Ref: 123-45-6789", "###-##-####")
            .unwrap();
        assert_eq!(found.as_deref(), Some("123-45-6789"));

        assert!(extractor.set_mode("regex").is_err());
    }

    #[wasm_bindgen_test]
    fn test_ocr_result_reading_order() {
        let mut result = OcrResultJs::new(400, 200);
        result.add_box("second", 10.0, 60.0, 90.0, 60.0, 90.0, 75.0, 10.0, 75.0, 0.9);
        result.add_box("first", 10.0, 5.0, 90.0, 5.0, 90.0, 18.0, 10.0, 18.0, 0.9);
        assert_eq!(result.get_text(), "first\nsecond");
    }
}
