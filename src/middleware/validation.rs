use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Largest request body the middleware will buffer.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const MAX_AGE: i64 = 150;

/// An Axum middleware that validates user payloads before they reach a handler.
///
/// `POST` bodies must carry `name` and `email`; `PUT` bodies may carry any
/// subset of the mutable fields, but whatever is present must be well formed.
/// Other methods pass through untouched. On success the buffered body is
/// handed on unchanged.
pub async fn validate_user_body(req: Request, next: Next) -> Response {
    let creating = if req.method() == Method::POST {
        true
    } else if req.method() == Method::PUT {
        false
    } else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::BadRequest(format!("Failed to read request body: {}", e)).into_response();
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => return AppError::BadRequest("Request body must be valid JSON".to_string()).into_response(),
    };

    if let Err(e) = validate_user_payload(&payload, creating) {
        tracing::debug!("Rejected user payload for {}: {}", parts.uri.path(), e);
        return e.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Checks the shape of a create (`creating == true`) or update payload.
pub fn validate_user_payload(payload: &Value, creating: bool) -> Result<(), AppError> {
    let Some(obj) = payload.as_object() else {
        return Err(AppError::BadRequest("Request body must be a JSON object".to_string()));
    };

    if creating && (is_absent(obj, "name") || is_absent(obj, "email")) {
        return Err(AppError::BadRequest("Name and email are required".to_string()));
    }

    if let Some(name) = present(obj, "name") {
        match name.as_str() {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(invalid("name", "name must be a non-empty string")),
        }
    }

    if let Some(email) = present(obj, "email") {
        match email.as_str() {
            Some(s) if is_plausible_email(s.trim()) => {}
            Some(_) => return Err(invalid("email", "email must look like local@domain")),
            None => return Err(invalid("email", "email must be a non-empty string")),
        }
    }

    if let Some(age) = present(obj, "age") {
        match age.as_i64() {
            Some(a) if (0..=MAX_AGE).contains(&a) => {}
            _ => return Err(invalid("age", &format!("age must be an integer between 0 and {}", MAX_AGE))),
        }
    }

    if let Some(gender) = present(obj, "gender") {
        if !matches!(gender.as_str(), Some("male") | Some("female")) {
            return Err(invalid("gender", "gender must be 'male' or 'female'"));
        }
    }

    Ok(())
}

/// A field counts as present unless missing or `null`.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn is_absent(obj: &Map<String, Value>, key: &str) -> bool {
    match present(obj, key) {
        None => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace),
        None => false,
    }
}

fn invalid(field: &str, message: &str) -> AppError {
    AppError::ValidationError { field: field.to_string(), message: message.to_string() }
}
