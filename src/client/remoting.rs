//! Remoting client
//!
//! Encodes calls into a request bundle, hands it to a [`Transport`] and
//! decodes the reply.

use std::sync::Arc;

use tokio::time::timeout;

use crate::amf::{DecodeWarning, TypeRegistry};
use crate::error::{Error, Result};
use crate::remoting::bundle::{BundleDecoder, MessageBundle};
use crate::remoting::flatten::{flatten_response, FlatResponse};
use crate::remoting::request::{new_request_with_version, IdGenerator, RemotingRequest, UuidIds};

use super::config::ClientConfig;
use super::transport::Transport;

/// Decoded reply with the warnings raised while decoding it
#[derive(Debug, Clone)]
pub struct CallResponse {
    pub bundle: MessageBundle,
    pub warnings: Vec<DecodeWarning>,
}

/// Remoting client
pub struct RemotingClient<T: Transport> {
    config: ClientConfig,
    transport: T,
    registry: Arc<TypeRegistry>,
    ids: Box<dyn IdGenerator>,
}

impl<T: Transport> RemotingClient<T> {
    /// Create a client using the Flex message shapes and random UUIDs
    pub fn new(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            registry: Arc::new(TypeRegistry::flex()),
            ids: Box::new(UuidIds),
        })
    }

    /// Replace the registry used to materialize reply objects
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the identifier source
    pub fn with_ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one call
    pub async fn call(&self, request: RemotingRequest) -> Result<CallResponse> {
        self.call_batch(&[request]).await
    }

    /// Send several calls in one bundle
    ///
    /// Replies come back in one bundle, matched to calls by response URI
    /// (`/1`, `/2`, ...).
    pub async fn call_batch(&self, requests: &[RemotingRequest]) -> Result<CallResponse> {
        let requests: Vec<RemotingRequest> = requests
            .iter()
            .map(|request| match request.endpoint {
                Some(_) => request.clone(),
                None => request.clone().endpoint(self.config.ds_endpoint.as_str()),
            })
            .collect();

        let encoded = new_request_with_version(&requests, self.ids.as_ref(), self.config.amf_version)?;
        tracing::debug!(
            url = %self.config.endpoint_url,
            calls = requests.len(),
            bytes = encoded.body.len(),
            "Sending remoting request"
        );

        let reply = timeout(
            self.config.request_timeout,
            self.transport
                .post(&self.config.endpoint_url, &self.config.content_type, encoded.body),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                url = %self.config.endpoint_url,
                timeout_ms = self.config.request_timeout.as_millis() as u64,
                "Remoting request timed out"
            );
            Error::Timeout
        })??;

        let mut decoder = BundleDecoder::new(self.registry.clone());
        let bundle = decoder.decode(&reply)?;
        tracing::info!(
            url = %self.config.endpoint_url,
            messages = bundle.messages.len(),
            warnings = decoder.warnings().len(),
            "Received remoting reply"
        );

        Ok(CallResponse {
            bundle,
            warnings: decoder.warnings().to_vec(),
        })
    }

    /// Send several calls and flatten the reply bodies
    pub async fn call_flat(&self, requests: &[RemotingRequest]) -> Result<FlatResponse> {
        let response = self.call_batch(requests).await?;
        flatten_response(&response.bundle)
    }
}
