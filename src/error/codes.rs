/// Error code registry for distsort
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Connectivity errors (recoverable by choosing another peer)
/// - 3000-3999: Protocol errors
/// - 4000-4999: Coordination errors
/// - 5000-5999: Data errors
/// - 6000-6999: Storage errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_PARSE_ERROR: u16 = 1001;
    pub const CONFIG_INVALID_VALUE: u16 = 1002;

    // Connectivity errors (2000-2999)
    pub const CONNECT_FAILED: u16 = 2000;
    pub const CONNECT_IO: u16 = 2001;
    pub const CONNECT_TIMEOUT: u16 = 2002;

    // Protocol errors (3000-3999)
    pub const PROTOCOL_GENERIC: u16 = 3000;
    pub const PROTOCOL_FRAME_TOO_LARGE: u16 = 3001;
    pub const PROTOCOL_UNSUPPORTED_OPERATION: u16 = 3002;

    // Coordination errors (4000-4999)
    pub const NO_RESULT: u16 = 4000;
    pub const NO_WORKERS: u16 = 4001;
    pub const MAP_PHASE_INCOMPLETE: u16 = 4002;
    pub const REDUCE_REJECTED: u16 = 4003;
    pub const RETRIES_EXHAUSTED: u16 = 4004;

    // Data errors (5000-5999)
    pub const RECORD_PARSE: u16 = 5000;

    // Storage errors (6000-6999)
    pub const STORAGE_IO: u16 = 6000;
}

/// Human-readable description of an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration could not be parsed",
        ErrorCode::CONFIG_INVALID_VALUE => "Configuration value out of range",
        ErrorCode::CONNECT_FAILED => "Peer unreachable",
        ErrorCode::CONNECT_IO => "Connection dropped mid-exchange",
        ErrorCode::CONNECT_TIMEOUT => "Network deadline expired",
        ErrorCode::PROTOCOL_GENERIC => "Malformed request or response",
        ErrorCode::PROTOCOL_FRAME_TOO_LARGE => "Frame exceeds the maximum size",
        ErrorCode::PROTOCOL_UNSUPPORTED_OPERATION => "Operation not served by this role",
        ErrorCode::NO_RESULT => "Peer returned the no-result sentinel",
        ErrorCode::NO_WORKERS => "No workers registered",
        ErrorCode::MAP_PHASE_INCOMPLETE => "Partitions left unsorted after all sweeps",
        ErrorCode::REDUCE_REJECTED => "Reduce result failed verification",
        ErrorCode::RETRIES_EXHAUSTED => "Map/reduce attempts exhausted",
        ErrorCode::RECORD_PARSE => "Line could not be parsed as a record key",
        ErrorCode::STORAGE_IO => "File read or write failed",
        _ => "Unknown error",
    }
}
