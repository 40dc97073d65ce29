use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use evalhub_core::ValidationErrors;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const JSON_CONTENT_TYPE: &str = "application/json";

// -------------------------
// Error envelope
// -------------------------

/// High-level API errors mapped to HTTP status codes and the failure envelope
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        /// Class name of the resource that could not be resolved.
        resource: Option<String>,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed: {message}")]
    ValidationFailed {
        message: String,
        errors: ValidationErrors,
    },
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub const VALIDATION_FAILED: &'static str = "Validation failed";
    const INTERNAL_MESSAGE: &'static str = "Internal server error";

    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    #[must_use]
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
            resource: None,
        }
    }
    #[must_use]
    pub fn resource_not_found(msg: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
            resource: Some(resource.into()),
        }
    }
    #[must_use]
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    #[must_use]
    pub fn validation(errors: ValidationErrors) -> Self {
        Self::ValidationFailed {
            message: Self::VALIDATION_FAILED.to_string(),
            errors,
        }
    }
    /// Validation failure whose summary is the list itself, with every
    /// message also listed under `validation_errors.base`.
    #[must_use]
    pub fn validation_messages(messages: Vec<String>) -> Self {
        let mut errors = ValidationErrors::new();
        for message in &messages {
            errors.add_base(message.clone());
        }
        Self::ValidationFailed {
            message: messages.join(", "),
            errors,
        }
    }
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients. Internal details are never exposed.
    pub fn public_message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg) => msg,
            ApiError::NotFound { message, .. } | ApiError::ValidationFailed { message, .. } => {
                message
            }
            ApiError::Internal(_) => Self::INTERNAL_MESSAGE,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// `{success: false, error, status, ...details}`
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("error".into(), Value::String(self.public_message().to_string()));
        body.insert("status".into(), Value::from(self.status_code().as_u16()));
        match self {
            ApiError::NotFound {
                resource: Some(resource),
                ..
            } => {
                body.insert("resource".into(), Value::String(resource.clone()));
            }
            ApiError::ValidationFailed { errors, .. } => {
                let errors = serde_json::to_value(errors).unwrap_or(Value::Null);
                body.insert("validation_errors".into(), errors);
            }
            _ => {}
        }
        Value::Object(body)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed with internal error");
        }
        let status = self.status_code();
        let mut headers = Vec::new();
        if status == StatusCode::UNAUTHORIZED {
            headers.push((header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer")));
        }
        json_response(status, &self.to_body(), headers)
    }
}

// -------------------------
// Success envelope
// -------------------------

/// `{success: true, message, status, data?}`; `data` is omitted when empty.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: Option<T>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            data,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(message, Some(data), StatusCode::OK)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(message, Some(data), StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl ApiResponse<Value> {
    /// Success envelope without a payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message, None, StatusCode::OK)
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(true));
        body.insert("message".into(), Value::String(self.message.clone()));
        body.insert("status".into(), Value::from(self.status.as_u16()));
        if let Some(data) = &self.data {
            match serde_json::to_value(data) {
                Ok(value) if !is_empty_value(&value) => {
                    body.insert("data".into(), value);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize response data");
                }
            }
        }
        Value::Object(body)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = self.to_body();
        json_response(self.status, &body, self.headers)
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn json_response(
    status: StatusCode,
    body: &Value,
    headers: Vec<(HeaderName, HeaderValue)>,
) -> Response {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = (status, bytes).into_response();
    let map = response.headers_mut();
    map.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    for (name, value) in headers {
        map.insert(name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Missing required parameter: question_id").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            &HeaderValue::from_static("application/json")
        );
    }

    #[test]
    fn unauthorized_carries_www_authenticate() {
        let resp = ApiError::unauthorized("Missing authorization token").into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            &HeaderValue::from_static("Bearer")
        );
        let resp = ApiError::forbidden("Instructor access required").into_response();
        assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (
                ApiError::validation(ValidationErrors::single("name", "can't be blank")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.to_body()["status"], status.as_u16());
            assert_eq!(err.to_body()["success"], false);
        }
    }

    #[test]
    fn not_found_body_includes_resource() {
        let body = ApiError::resource_not_found("Evaluation ID is missing", "Evaluation").to_body();
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": "Evaluation ID is missing",
                "status": 404,
                "resource": "Evaluation"
            })
        );
    }

    #[test]
    fn validation_body_lists_field_errors() {
        let body = ApiError::validation(ValidationErrors::single("name", "can't be blank")).to_body();
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["validation_errors"], json!({"name": ["can't be blank"]}));
    }

    #[test]
    fn validation_messages_join_summary() {
        let err = ApiError::validation_messages(vec![
            "Evaluation question 9 not found".into(),
            "Must provide an answer".into(),
        ]);
        let body = err.to_body();
        assert_eq!(body["error"], "Evaluation question 9 not found, Must provide an answer");
        assert_eq!(body["validation_errors"]["base"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let body = ApiError::internal("lock poisoned at storage.rs").to_body();
        assert_eq!(body["error"], "Internal server error");
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_with_data() {
        let resp = ApiResponse::ok("Evaluation retrieved successfully", json!({"id": 1}));
        assert_eq!(
            resp.to_body(),
            json!({
                "success": true,
                "message": "Evaluation retrieved successfully",
                "status": 200,
                "data": {"id": 1}
            })
        );
    }

    #[test]
    fn empty_data_is_omitted() {
        let body = ApiResponse::ok("Answers retrieved successfully", Vec::<Value>::new()).to_body();
        assert!(body.get("data").is_none());
        let body = ApiResponse::message("Signed out successfully").to_body();
        assert!(body.get("data").is_none());
    }

    #[test]
    fn created_sets_status_and_headers() {
        let resp = ApiResponse::created("Answer created successfully", json!({"id": 3}))
            .with_header(header::LOCATION, HeaderValue::from_static("/api/answers/3"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            &HeaderValue::from_static("/api/answers/3")
        );
    }
}
