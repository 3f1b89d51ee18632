//! HTTP methods, statuses, and the structured response type

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Connect,
}

impl HttpMethod {
    /// Wire spelling of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status, including the synthetic codes for local failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpStatus {
    Ok,
    NoContent,
    MultiStatus,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    ProxyAuthenticationRequired,
    RequestTimeout,
    PayloadTooLarge,
    TooManyRequests,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
    HttpVersionNotSupported,
    /// No response arrived at all (connect/read failure)
    NoHttpResponse,
    /// The connection is suspended after consecutive failures
    Suspend,
    /// A local failure with no better classification (DNS, TLS, serialization)
    Unknown,
}

impl HttpStatus {
    /// Map a wire status code; unrecognized codes become [`Self::Unknown`]
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => Self::Ok,
            204 => Self::NoContent,
            207 => Self::MultiStatus,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            407 => Self::ProxyAuthenticationRequired,
            408 => Self::RequestTimeout,
            413 => Self::PayloadTooLarge,
            429 => Self::TooManyRequests,
            500 => Self::InternalServerError,
            501 => Self::NotImplemented,
            503 => Self::ServiceUnavailable,
            505 => Self::HttpVersionNotSupported,
            _ => Self::Unknown,
        }
    }

    /// The wire code, when the status is a real HTTP status
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Ok => Some(200),
            Self::NoContent => Some(204),
            Self::MultiStatus => Some(207),
            Self::BadRequest => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::MethodNotAllowed => Some(405),
            Self::ProxyAuthenticationRequired => Some(407),
            Self::RequestTimeout => Some(408),
            Self::PayloadTooLarge => Some(413),
            Self::TooManyRequests => Some(429),
            Self::InternalServerError => Some(500),
            Self::NotImplemented => Some(501),
            Self::ServiceUnavailable => Some(503),
            Self::HttpVersionNotSupported => Some(505),
            Self::NoHttpResponse | Self::Suspend | Self::Unknown => None,
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::NoContent | Self::MultiStatus)
    }

    /// Whether the status is a client error other than rate limiting
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::Unauthorized
                | Self::Forbidden
                | Self::NotFound
                | Self::MethodNotAllowed
                | Self::ProxyAuthenticationRequired
                | Self::RequestTimeout
                | Self::PayloadTooLarge
        )
    }

    /// Whether the status is in the 5xx range
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::InternalServerError | Self::NotImplemented | Self::ServiceUnavailable | Self::HttpVersionNotSupported
        )
    }
}

/// A structured HTTP response (or synthetic local failure)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    status: HttpStatus,
    body: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl HttpResponse {
    /// Response with a status and body, no headers
    pub fn new(status: HttpStatus, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Response with headers; header names are folded to lowercase
    pub fn with_headers(status: HttpStatus, body: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect(),
        }
    }

    /// The response status
    pub fn status(&self) -> HttpStatus {
        self.status
    }

    /// The response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Case-insensitive header lookup
    pub fn header_val(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status.code() {
            Some(code) => write!(f, "[Status-code]: {code}, [Body]: {}", self.body),
            None => write!(f, "[Status-code]: {:?}, [Body]: {}", self.status, self.body),
        }
    }
}
