//! Client configuration

use std::time::Duration;

use crate::error::{Error, Result};
use crate::remoting::constants::{CONTENT_TYPE, DEFAULT_AMF_VERSION, MAX_AMF_VERSION};

/// Remoting client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway URL requests are posted to (http[s]://host/path)
    pub endpoint_url: String,

    /// Time allowed for one round trip through the transport
    pub request_timeout: Duration,

    /// Envelope version written on requests
    pub amf_version: u16,

    /// `DSEndpoint` header for requests that don't set their own
    pub ds_endpoint: String,

    /// Content-Type handed to the transport
    pub content_type: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            request_timeout: Duration::from_secs(30),
            amf_version: DEFAULT_AMF_VERSION,
            ds_endpoint: String::new(),
            content_type: CONTENT_TYPE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new config for the given gateway URL
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the envelope version
    pub fn amf_version(mut self, version: u16) -> Self {
        self.amf_version = version;
        self
    }

    /// Set the default `DSEndpoint` header
    pub fn ds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.ds_endpoint = endpoint.into();
        self
    }

    /// Check the config before the first request
    pub fn validate(&self) -> Result<()> {
        let url = self.endpoint_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!("Invalid endpoint URL: {:?}", url)));
        }
        if self.amf_version > MAX_AMF_VERSION {
            return Err(Error::Config(format!(
                "Unsupported AMF version: {}",
                self.amf_version
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("Request timeout must be positive".into()));
        }
        Ok(())
    }
}
