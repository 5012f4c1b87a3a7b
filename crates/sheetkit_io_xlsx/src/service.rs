//! Transport-agnostic conversion boundary.
//!
//! Decodes request envelopes, runs the writer or reader, and describes the
//! response. Routing and HTTP plumbing stay with the embedding server.

use serde::{Deserialize, Serialize};

use crate::conf::C_MIME_XLSX;
use crate::reader::read_records_from_xlsx_bytes;
use crate::spec::{
    Result, SpecColumn, SpecRecord, SpecStringRecord, SpecXlsxConvertOptions, SpecXlsxReport,
    XlsxConvertError,
};
use crate::writer::XlsxRecordWriter;

/// Column metadata of a conversion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecConversionMeta {
    /// Ordered column schema.
    #[serde(default)]
    pub columns: Vec<SpecColumn>,
}

/// Conversion request envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecConversionRequest {
    /// Download file name hint.
    #[serde(default)]
    pub filename: String,
    /// Records to convert.
    #[serde(default)]
    pub data: Vec<SpecRecord>,
    /// Schema wrapper.
    #[serde(default)]
    pub meta: SpecConversionMeta,
}

/// Serialized workbook plus the headers it is delivered with.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxAttachment {
    /// File name hint from the request.
    pub filename: String,
    /// MIME type.
    pub content_type: &'static str,
    /// Workbook bytes.
    pub bytes: Vec<u8>,
    /// Conversion report.
    pub report: SpecXlsxReport,
}

impl SpecXlsxAttachment {
    /// `Content-Disposition` header value.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename={}", self.filename)
    }
}

/// Decode a JSON request envelope.
pub fn decode_conversion_request(body: &[u8]) -> Result<SpecConversionRequest> {
    serde_json::from_slice(body).map_err(|err| XlsxConvertError::Decode(err.to_string()))
}

/// Encode reverse-read records as a JSON array.
pub fn encode_records_json(records: &[SpecStringRecord]) -> Result<Vec<u8>> {
    serde_json::to_vec(records)
        .map_err(|err| XlsxConvertError::Read(format!("Cannot encode records: {err}")))
}

/// Conversion entry point shared by every transport.
#[derive(Debug, Clone)]
pub struct XlsxConversionService {
    writer: XlsxRecordWriter,
}

impl XlsxConversionService {
    /// Create a service with validated `options`.
    pub fn new(options: SpecXlsxConvertOptions) -> Result<Self> {
        Ok(Self {
            writer: XlsxRecordWriter::new(options)?,
        })
    }

    /// Writer used for conversions.
    pub fn writer(&self) -> &XlsxRecordWriter {
        &self.writer
    }

    /// Decode `body` and convert it into an attachment.
    pub fn handle_conversion(&self, body: &[u8]) -> Result<SpecXlsxAttachment> {
        let res_attachment =
            decode_conversion_request(body).and_then(|request| self.convert_request(request));
        if let Err(err) = &res_attachment {
            tracing::error!(
                status = err.class().status_code(),
                error = %err,
                "conversion request failed"
            );
        }
        res_attachment
    }

    /// Convert a decoded request into an attachment.
    pub fn convert_request(&self, request: SpecConversionRequest) -> Result<SpecXlsxAttachment> {
        if request.data.is_empty() {
            return Err(XlsxConvertError::Validation("No data provided".to_string()));
        }

        let (bytes, report) = self.writer.convert(&request.data, &request.meta.columns)?;
        tracing::info!(
            filename = request.filename.as_str(),
            n_records = request.data.len(),
            strategy = ?report.strategy,
            "conversion succeeded"
        );

        Ok(SpecXlsxAttachment {
            filename: request.filename,
            content_type: C_MIME_XLSX,
            bytes,
            report,
        })
    }

    /// Read a workbook back into JSON-encoded string records.
    pub fn convert_xlsx_to_json(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let records = read_records_from_xlsx_bytes(bytes)?;
        encode_records_json(&records)
    }
}
