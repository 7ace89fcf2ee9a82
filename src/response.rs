//! The response model plugins extract from
//!
//! The flow layer owns HTTP transport; it hands each received response to the
//! plugins as an [`HttpResponse`], either built directly or converted from a
//! `reqwest` blocking response.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Body text, headers and cookies of one received HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    text: String,
}

impl HttpResponse {
    /// Response with status 200, the given body and no headers or cookies
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            text: text.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header value. Repeated names keep every value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Converts a live `reqwest` response, consuming its body.
    ///
    /// Cookies are taken from the response's `Set-Cookie` headers.
    pub fn from_blocking(response: reqwest::blocking::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let cookies = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let text = response.text()?;

        Ok(Self {
            status,
            headers,
            cookies,
            text,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Header lookup, case-insensitive. Repeated headers are joined with `", "`.
    pub fn header(&self, name: &str) -> Option<String> {
        let values: Vec<&str> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }
}
