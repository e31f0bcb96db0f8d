//! Hand-off of captured stills to an OCR engine.
//!
//! The engine itself lives outside this crate behind [`OcrGateway`]. Whatever
//! happens on the other side, callers of [`OcrClient::scan_still`] always get
//! one [`CheckDetails`] per configured backend; failures show up as
//! "Not Found" fields instead of errors.

mod command;

pub use command::CommandGateway;

use crate::config::OcrConfig;
use image::{ImageFormat, RgbImage};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Cursor;

pub const NOT_FOUND: &str = "Not Found";

/// One parsed MICR field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Found(String),
    NotFound,
}

impl FieldValue {
    /// Blank values and the literal "Not Found" sentinel both map to `NotFound`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() && value != NOT_FOUND => {
                FieldValue::Found(value.to_string())
            }
            _ => FieldValue::NotFound,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Found(value) => value,
            FieldValue::NotFound => NOT_FOUND,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FieldValue::Found(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MICR fields read by one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDetails {
    pub routing_number: FieldValue,
    pub account_number: FieldValue,
    pub check_number: FieldValue,
}

impl CheckDetails {
    pub fn not_found() -> Self {
        Self {
            routing_number: FieldValue::NotFound,
            account_number: FieldValue::NotFound,
            check_number: FieldValue::NotFound,
        }
    }
}

/// Backend name -> fields.
pub type ScanResults = BTreeMap<String, CheckDetails>;

/// A still ready for the gateway, encoded as PNG.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub id: String,
    pub png: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to encode still: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to talk to OCR engine: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR engine failed: {0}")]
    Gateway(String),
    #[error("malformed OCR response: {0}")]
    Response(String),
    #[error("OCR engine did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// External OCR engine.
pub trait OcrGateway {
    fn scan(&mut self, request: &ScanRequest) -> Result<ScanResults, OcrError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OcrError> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Submits stills and shapes whatever comes back into one result per backend.
pub struct OcrClient<G> {
    gateway: G,
    backends: Vec<String>,
    request_id: String,
}

impl<G: OcrGateway> OcrClient<G> {
    pub fn new(gateway: G, config: &OcrConfig) -> Self {
        Self {
            gateway,
            backends: config.backends.clone(),
            request_id: config.request_id.clone(),
        }
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Never fails: gateway errors become all-"Not Found" results.
    pub fn scan_still(&mut self, still: &RgbImage) -> ScanResults {
        let _span = tracing::debug_span!("ocr", gateway = self.gateway.name()).entered();

        match self.try_scan(still) {
            Ok(mut results) => {
                for backend in &self.backends {
                    results
                        .entry(backend.clone())
                        .or_insert_with(CheckDetails::not_found);
                }
                results.retain(|backend, _| self.backends.contains(backend));
                results
            }
            Err(err) => {
                tracing::warn!(
                    gateway = self.gateway.name(),
                    error = %err,
                    "OCR scan failed, reporting all fields as not found"
                );
                self.fallback()
            }
        }
    }

    fn try_scan(&mut self, still: &RgbImage) -> Result<ScanResults, OcrError> {
        let request = ScanRequest {
            id: self.request_id.clone(),
            png: encode_png(still)?,
        };
        tracing::debug!(id = %request.id, bytes = request.png.len(), "sending scan request");
        self.gateway.scan(&request)
    }

    fn fallback(&self) -> ScanResults {
        self.backends
            .iter()
            .map(|backend| (backend.clone(), CheckDetails::not_found()))
            .collect()
    }
}
