//! Remoting client
//!
//! Sends call bundles to an AMF gateway through a pluggable transport:
//! - Single calls and batches in one round trip
//! - Per-request timeout
//! - Reply decoding against the Flex message shapes

pub mod config;
pub mod remoting;
pub mod transport;

pub use config::ClientConfig;
pub use remoting::{CallResponse, RemotingClient};
pub use transport::Transport;
