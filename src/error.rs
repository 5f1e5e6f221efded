//! Unified error types for amf-remoting

use std::fmt;
use std::io;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all codec and remoting operations
#[derive(Debug)]
pub enum Error {
    /// I/O error reported by a transport
    Io(io::Error),
    /// AMF encoding/decoding error (malformed stream)
    Amf(AmfError),
    /// Remoting envelope violation
    Remoting(RemotingError),
    /// Transport failed to deliver the request
    Transport(String),
    /// Request timed out
    Timeout,
    /// Invalid configuration
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Remoting(e) => write!(f, "Remoting error: {}", e),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::Timeout => write!(f, "Request timed out"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Amf(e) => Some(e),
            Error::Remoting(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<AmfError> for Error {
    fn from(err: AmfError) -> Self {
        Error::Amf(err)
    }
}

impl From<RemotingError> for Error {
    fn from(err: RemotingError) -> Self {
        Error::Remoting(err)
    }
}

/// Which reference table an index was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// AMF3 string table
    String,
    /// AMF3 object table, also the AMF0 complex-value table
    Object,
    /// AMF3 traits table
    Traits,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::String => write!(f, "string"),
            TableKind::Object => write!(f, "object"),
            TableKind::Traits => write!(f, "traits"),
        }
    }
}

/// AMF decoding errors
///
/// Every variant means the byte stream cannot be decoded any further. The
/// current value (and the enclosing message) is abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfError {
    UnknownMarker(u8),
    UnexpectedEof,
    InvalidUtf8,
    InvalidReference { table: TableKind, index: usize },
    /// Reference to an object whose members are still being decoded
    CyclicReference(usize),
    NestingTooDeep,
    InvalidObjectEnd,
    /// Recognized marker whose payload is not materialized (RecordSet, MovieClip, vectors, dictionary)
    UnsupportedType(&'static str),
    /// Externalizable AMF3 object, identified by class alias
    Externalizable(String),
    /// References would copy more than this many values
    ReferenceExpansion { limit: usize },
    /// Length too large for its wire header (encode side)
    LengthOverflow { what: &'static str, len: usize },
}

impl AmfError {
    /// Whether the error came from reading a bad byte stream
    ///
    /// Only `LengthOverflow`, raised while encoding, is not.
    pub fn is_malformed_stream(&self) -> bool {
        !matches!(self, AmfError::LengthOverflow { .. })
    }
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnknownMarker(m) => write!(f, "Unknown AMF marker: 0x{:02x}", m),
            AmfError::UnexpectedEof => write!(f, "Unexpected end of AMF data"),
            AmfError::InvalidUtf8 => write!(f, "Invalid UTF-8 in AMF string"),
            AmfError::InvalidReference { table, index } => {
                write!(f, "Invalid AMF {} reference: {}", table, index)
            }
            AmfError::CyclicReference(idx) => write!(f, "Cyclic AMF object reference: {}", idx),
            AmfError::NestingTooDeep => write!(f, "AMF nesting too deep"),
            AmfError::InvalidObjectEnd => write!(f, "Invalid object end marker"),
            AmfError::UnsupportedType(name) => write!(f, "Unsupported AMF type: {}", name),
            AmfError::Externalizable(alias) => {
                write!(f, "Externalizable AMF object not supported: {}", alias)
            }
            AmfError::ReferenceExpansion { limit } => {
                write!(f, "AMF references expand past {} values", limit)
            }
            AmfError::LengthOverflow { what, len } => {
                write!(f, "AMF {} too long to encode: {}", what, len)
            }
        }
    }
}

impl std::error::Error for AmfError {}

/// Remoting envelope errors
#[derive(Debug, Clone, PartialEq)]
pub enum RemotingError {
    /// Envelope version above 0x09
    UnsupportedVersion(u16),
    /// Request body did not start with an array marker
    ExpectedArgumentArray(u8),
    /// No request was given to the builder
    EmptyRequest,
    /// Request argument group with a missing or mistyped entry
    InvalidArgument(String),
    /// Too many headers or messages for a 16-bit count
    TooMany { what: &'static str, count: usize },
    /// Reply body without the expected shape
    UnexpectedBody { index: usize, reason: &'static str },
    /// Header name or URI longer than a 16-bit length prefix allows
    StringTooLong { what: &'static str, len: usize },
}

impl fmt::Display for RemotingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotingError::UnsupportedVersion(v) => {
                write!(f, "Unsupported AMF envelope version: {}", v)
            }
            RemotingError::ExpectedArgumentArray(m) => {
                write!(f, "Expected array marker in request body, found 0x{:02x}", m)
            }
            RemotingError::EmptyRequest => write!(f, "No request given"),
            RemotingError::InvalidArgument(msg) => write!(f, "Invalid request argument: {}", msg),
            RemotingError::TooMany { what, count } => {
                write!(f, "Too many {} for one bundle: {}", what, count)
            }
            RemotingError::UnexpectedBody { index, reason } => {
                write!(f, "Unexpected body in message {}: {}", index, reason)
            }
            RemotingError::StringTooLong { what, len } => {
                write!(f, "{} too long for the envelope: {} bytes", what, len)
            }
        }
    }
}

impl std::error::Error for RemotingError {}
