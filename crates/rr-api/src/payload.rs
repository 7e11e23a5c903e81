//! Request bodies that may arrive as JSON or as `multipart/form-data`.

use crate::error::ApiError;
use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest};
use futures_util::StreamExt;
use rr_core::validation::Fields;
use serde_json::Value;
use std::collections::HashMap;

const MAX_JSON_BYTES: usize = 2 * 1024 * 1024;
const MAX_FILE_BYTES: usize = 20 * 1024 * 1024;
const MAX_TEXT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

/// Text fields plus any uploaded files, keyed by form field name.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: Fields,
    pub files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// Text fields as plain strings, for the HTML forms.
    pub fn text_map(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Reads the whole body as a JSON value.
pub async fn read_json(mut payload: web::Payload) -> Result<Value, ApiError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ApiError::invalid("detail", format!("Could not read body: {}", e)))?;
        if body.len() + chunk.len() > MAX_JSON_BYTES {
            return Err(ApiError::invalid("detail", "Request body is too large."));
        }
        body.extend_from_slice(&chunk);
    }
    if body.is_empty() {
        return Ok(Value::Object(Fields::new()));
    }
    serde_json::from_slice(&body)
        .map_err(|e| ApiError::invalid("detail", format!("JSON parse error - {}", e)))
}

/// Requires a JSON object.
pub fn expect_object(value: Value) -> Result<Fields, ApiError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ApiError::invalid(
            "non_field_errors",
            format!("Invalid data. Expected a dictionary, but got {}.", json_kind(&other)),
        )),
    }
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<FormData, ApiError> {
    let mut form = FormData::default();
    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|e| ApiError::invalid("detail", format!("Multipart form parse error - {}", e)))?;
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);
        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".into());

        let limit = if filename.is_some() { MAX_FILE_BYTES } else { MAX_TEXT_BYTES };
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::invalid(&name, format!("Upload failed: {}", e)))?;
            if data.len() + chunk.len() > limit {
                return Err(ApiError::invalid(&name, "The submitted file is too large."));
            }
            data.extend_from_slice(&chunk);
        }

        if name.is_empty() {
            continue;
        }
        match filename {
            // Browsers send an empty part for an untouched file input.
            Some(filename) if filename.is_empty() && data.is_empty() => {}
            Some(filename) => {
                if data.is_empty() {
                    return Err(ApiError::invalid(&name, "The submitted file is empty."));
                }
                form.files.insert(
                    name,
                    UploadedFile {
                        data,
                        content_type,
                        filename: Some(filename),
                    },
                );
            }
            None => {
                let text = String::from_utf8(data)
                    .map_err(|_| ApiError::invalid(&name, "Not a valid string."))?;
                form.fields.insert(name, Value::String(text));
            }
        }
    }
    Ok(form)
}

/// Accepts `multipart/form-data` or a JSON object body.
pub async fn read_form(req: &HttpRequest, payload: web::Payload) -> Result<FormData, ApiError> {
    if is_multipart(req) {
        read_multipart(Multipart::new(req.headers(), payload)).await
    } else {
        let fields = expect_object(read_json(payload).await?)?;
        Ok(FormData {
            fields,
            files: HashMap::new(),
        })
    }
}
