//! Transport seam
//!
//! The client does not ship an HTTP stack. Implement [`Transport`] on top
//! of whatever HTTP client the application already uses.
//!
//! ```ignore
//! struct Http(reqwest::Client);
//!
//! #[async_trait::async_trait]
//! impl Transport for Http {
//!     async fn post(&self, url: &str, content_type: &str, body: Bytes) -> Result<Bytes> {
//!         let resp = self.0.post(url)
//!             .header("Content-Type", content_type)
//!             .body(body)
//!             .send()
//!             .await
//!             .map_err(|e| Error::Transport(e.to_string()))?;
//!         resp.bytes().await.map_err(|e| Error::Transport(e.to_string()))
//!     }
//! }
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Delivers an encoded request and returns the raw reply
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` and return the response body
    async fn post(&self, url: &str, content_type: &str, body: Bytes) -> Result<Bytes>;
}
