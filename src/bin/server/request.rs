//! Multipart request parsing and error responses.

use axum::extract::Multipart;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use oar_structure::core::config::DEFAULT_VISUAL_MAX_PAGES;
use oar_structure::core::{OCRError, OcrParams, OcrResult, StructureParams};
use oar_structure::oarocr::DEFAULT_DROP_SCORE;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::error;

/// Errors returned by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A pipeline error.
    Pipeline(OCRError),
    /// Malformed request.
    BadRequest(String),
    /// Failure outside the pipeline, e.g. a panicked worker.
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl ToString) -> Self {
        Self::BadRequest(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(OCRError::ModelFilesIncomplete { .. }) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(OCRError::ModelNotLoaded { .. }) => StatusCode::CONFLICT,
            ApiError::Pipeline(OCRError::UnsupportedInput { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::Pipeline(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Pipeline(OCRError::ModelFilesIncomplete { missing }) => json!({
                "error": self.to_string(),
                "missing": missing,
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Pipeline(err) => {
                write!(f, "{err}")?;
                let mut source = std::error::Error::source(err);
                while let Some(cause) = source {
                    write!(f, ": {cause}")?;
                    source = cause.source();
                }
                Ok(())
            }
            ApiError::BadRequest(message) | ApiError::Internal(message) => f.write_str(message),
        }
    }
}

impl From<OCRError> for ApiError {
    fn from(err: OCRError) -> Self {
        Self::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Response of a draw endpoint: one PNG for an image, JSON for a PDF.
pub enum DrawResponse {
    Png(Vec<u8>),
    Json(Value),
}

impl IntoResponse for DrawResponse {
    fn into_response(self) -> Response {
        match self {
            DrawResponse::Png(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
            DrawResponse::Json(value) => Json(value).into_response(),
        }
    }
}

/// An uploaded file plus the other form fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Vec<u8>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Reads a multipart body; the `file` field is required.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        let mut has_file = false;
        while let Some(field) = multipart.next_field().await.map_err(ApiError::bad_request)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                form.file = field.bytes().await.map_err(ApiError::bad_request)?.to_vec();
                has_file = true;
            } else {
                let value = field.text().await.map_err(ApiError::bad_request)?;
                form.fields.insert(name, value);
            }
        }
        if !has_file {
            return Err(ApiError::bad_request("missing multipart field 'file'"));
        }
        if form.file.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }
        Ok(form)
    }

    /// First present field among `names`, parsed with `parse`.
    fn field<T>(&self, names: &[&str], parse: impl Fn(&str) -> Option<T>) -> OcrResult<Option<T>> {
        for name in names {
            if let Some(raw) = self.fields.get(*name) {
                let raw = raw.trim();
                return parse(raw)
                    .map(Some)
                    .ok_or_else(|| OCRError::invalid_field(*name, "a valid value", raw));
            }
        }
        Ok(None)
    }

    fn number<T: FromStr>(&self, names: &[&str], target: &mut T) -> OcrResult<()> {
        if let Some(value) = self.field(names, |raw| raw.parse().ok())? {
            *target = value;
        }
        Ok(())
    }

    fn flag(&self, names: &[&str], target: &mut bool) -> OcrResult<()> {
        if let Some(value) = self.field(names, parse_bool)? {
            *target = value;
        }
        Ok(())
    }

    /// OCR parameters, defaults overridden by form fields.
    pub fn ocr_params(&self) -> OcrResult<OcrParams> {
        let mut params = OcrParams::default();
        self.number(&["det_db_thresh", "ocr_det_db_thresh", "det_thresh"], &mut params.det_thresh)?;
        self.number(&["det_db_box_thresh", "box_thresh"], &mut params.box_thresh)?;
        self.number(&["unclip_ratio", "det_db_unclip_ratio"], &mut params.unclip_ratio)?;
        self.flag(&["use_cls", "use_angle_cls"], &mut params.use_cls)?;
        self.number(&["cls_thresh"], &mut params.cls_thresh)?;
        self.number(&["rec_score_thresh", "text_rec_score_thresh"], &mut params.rec_score_thresh)?;
        self.flag(&["merge_overlaps"], &mut params.merge_overlaps)?;
        self.number(&["overlap_threshold"], &mut params.overlap_threshold)?;
        params.validate()?;
        Ok(params)
    }

    /// Structure parameters, including the nested OCR parameters.
    pub fn structure_params(&self) -> OcrResult<StructureParams> {
        let mut params = StructureParams {
            ocr: self.ocr_params()?,
            ..StructureParams::default()
        };
        self.number(&["layout_conf_threshold"], &mut params.layout_conf_threshold)?;
        self.flag(&["merge_layout"], &mut params.merge_layout)?;
        self.number(&["layout_overlap_threshold"], &mut params.layout_overlap_threshold)?;
        self.flag(&["use_table_recognition"], &mut params.use_table_recognition)?;
        self.number(&["region_text_min_confidence"], &mut params.region_text_min_confidence)?;
        params.validate()?;
        Ok(params)
    }

    /// Page cap of the draw and markdown endpoints.
    pub fn max_pages(&self) -> OcrResult<usize> {
        let mut max_pages = DEFAULT_VISUAL_MAX_PAGES;
        self.number(&["max_pages"], &mut max_pages)?;
        if max_pages == 0 {
            return Err(OCRError::invalid_field("max_pages", "at least 1", "0"));
        }
        Ok(max_pages)
    }

    pub fn drop_score(&self) -> OcrResult<f32> {
        let mut drop_score = DEFAULT_DROP_SCORE;
        self.number(&["drop_score"], &mut drop_score)?;
        Ok(drop_score)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn form(fields: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            file: vec![1],
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_defaults_without_fields() {
        let form = form(&[]);
        assert_eq!(form.ocr_params().unwrap(), OcrParams::default());
        assert_eq!(form.structure_params().unwrap(), StructureParams::default());
        assert_eq!(form.max_pages().unwrap(), DEFAULT_VISUAL_MAX_PAGES);
    }

    #[test]
    fn test_fields_override_defaults() {
        let form = form(&[
            ("ocr_det_db_thresh", "0.4"),
            ("unclip_ratio", "1.1"),
            ("use_cls", "false"),
            ("merge_layout", "1"),
            ("layout_conf_threshold", "0.7"),
            ("max_pages", "5"),
        ]);
        let params = form.structure_params().unwrap();
        assert_eq!(params.ocr.det_thresh, 0.4);
        assert_eq!(params.ocr.unclip_ratio, 1.1);
        assert!(!params.ocr.use_cls);
        assert!(params.merge_layout);
        assert_eq!(params.layout_conf_threshold, 0.7);
        assert_eq!(form.max_pages().unwrap(), 5);
    }

    #[test]
    fn test_invalid_fields_are_client_errors() {
        let err = form(&[("cls_thresh", "high")]).ocr_params().unwrap_err();
        assert_eq!(ApiError::from(err).status(), StatusCode::BAD_REQUEST);
        let err = form(&[("unclip_ratio", "0.5")]).ocr_params().unwrap_err();
        assert!(err.is_client_error());
        assert!(form(&[("max_pages", "0")]).max_pages().is_err());
    }

    #[test]
    fn test_missing_models_body_lists_files() {
        let err = ApiError::from(OCRError::ModelFilesIncomplete {
            missing: vec![PathBuf::from("models/a.onnx")],
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.body()["missing"][0], "models/a.onnx");
    }

    #[test]
    fn test_inference_failure_is_server_error() {
        let err = ApiError::from(OCRError::inference_error("layout", "run", "boom"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body()["error"].as_str().unwrap().contains("boom"));
        assert!(err.body().get("missing").is_none());
    }
}
