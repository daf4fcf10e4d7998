use std::{io, net::AddrParseError, result};

use colorizers::ColorizeError;
use hyper::{header, Body, Response, StatusCode};
use thiserror::Error;

pub type Result<T> = result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Colorize(#[from] ColorizeError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("invalid bind address: {0}")]
    Addr(#[from] AddrParseError),

    #[error("http error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("colorization task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("upload is larger than {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("invalid value {value:?} for parameter `{param}`")]
    InvalidParam { param: &'static str, value: String },

    #[error("nothing here at {0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Colorize(e) => match e {
                ColorizeError::Decode { .. } => StatusCode::BAD_REQUEST,
                ColorizeError::Inference { .. } => StatusCode::BAD_GATEWAY,
                ColorizeError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ColorizeError::Encode(_) | ColorizeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::InvalidParam { .. } => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Colorize(e) => e.kind(),
            ServiceError::Config(_) | ServiceError::InvalidSetting { .. } => "config_error",
            ServiceError::Addr(_) => "config_error",
            ServiceError::Hyper(_) => "http_error",
            ServiceError::Io(_) => "io_error",
            ServiceError::Join(_) => "internal_error",
            ServiceError::PayloadTooLarge { .. } => "payload_too_large",
            ServiceError::InvalidParam { .. } => "invalid_param",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::MethodNotAllowed => "method_not_allowed",
        }
    }

    /// JSON error response shown to the user.
    pub fn to_response(&self) -> Response<Body> {
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorize_errors_map_to_statuses() {
        let decode: ServiceError = ColorizeError::decode("bad").into();
        assert_eq!(decode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(decode.kind(), "decode_error");

        let inference: ServiceError = ColorizeError::inference("boom").into();
        assert_eq!(inference.status(), StatusCode::BAD_GATEWAY);

        let unavailable: ServiceError = ColorizeError::ModelUnavailable {
            model_id: "m".to_owned(),
            dir: "/m".into(),
            reason: "gone".to_owned(),
        }
        .into();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn response_carries_json_body() {
        let response = ServiceError::PayloadTooLarge { limit: 10 }.to_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }
}
