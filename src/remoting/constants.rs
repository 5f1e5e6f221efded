//! Remoting protocol constants
//!
//! Reference: http://osflash.org/documentation/amf/envelopes/remoting

/// Envelope version written by this crate (Flash Player 9 and later)
pub const DEFAULT_AMF_VERSION: u16 = 3;

/// Highest envelope version accepted on decode
///
/// 0x00 is Flash Player 8 and below, 0x01 FlashCom/FMS, 0x03 Flash Player 9+.
pub const MAX_AMF_VERSION: u16 = 0x09;

/// Content-Type for remoting requests
pub const CONTENT_TYPE: &str = "application/x-amf";

/// Target URI used when a request does not name one
pub const DEFAULT_TARGET_URI: &str = "null";

/// Target URI suffix of a successful result
pub const SUFFIX_RESULT: &str = "/onResult";

/// Target URI suffix of a fault
pub const SUFFIX_STATUS: &str = "/onStatus";

/// Target URI suffix of debug events
pub const SUFFIX_DEBUG_EVENTS: &str = "/onDebugEvents";

/// Header carrying the data services client id
pub const HEADER_DS_ID: &str = "DSId";

/// Header naming the channel endpoint
pub const HEADER_DS_ENDPOINT: &str = "DSEndpoint";
