/// Error code registry for scrapeflow
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Flow definition errors
/// - 3000-3999: Document errors
/// - 4000-4999: Variable store errors
/// - 5000-5999: Projection errors
/// - 6000-6999: Persistence errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;

    // Flow definition errors (2000-2999)
    pub const FLOW_GENERIC: u16 = 2000;
    pub const FLOW_INVALID_SYNTAX: u16 = 2001;
    pub const FLOW_UNKNOWN_ACTION: u16 = 2002;
    pub const FLOW_MISSING_PARAMETER: u16 = 2003;
    pub const FLOW_INVALID_PARAMETER: u16 = 2004;

    // Document errors (3000-3999)
    pub const DOC_GENERIC: u16 = 3000;
    pub const DOC_PARSE_FAILED: u16 = 3001;
    pub const DOC_EMPTY_QUERY: u16 = 3002;
    pub const DOC_MARKER_NOT_FOUND: u16 = 3003;
    pub const DOC_NOT_TABULAR: u16 = 3004;

    // Variable store errors (4000-4999)
    pub const VAR_UNDEFINED: u16 = 4001;
    pub const VAR_EXHAUSTED: u16 = 4002;
    pub const VAR_TYPE_MISMATCH: u16 = 4003;
    pub const VAR_ENTRY_NOT_FOUND: u16 = 4004;

    // Projection errors (5000-5999)
    pub const TABLE_COLUMN_INDEX: u16 = 5001;

    // Persistence errors (6000-6999)
    pub const PERSIST_GENERIC: u16 = 6000;
    pub const PERSIST_IO: u16 = 6001;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid TOML syntax in configuration",

        2000 => "Generic flow definition error",
        2001 => "Invalid flow definition syntax",
        2002 => "Unknown action name",
        2003 => "Required action parameter is missing",
        2004 => "Invalid action parameter",

        3000 => "Generic document error",
        3001 => "Failed to parse document",
        3002 => "Single node query matched nothing",
        3003 => "Hierarchy marker not found",
        3004 => "Node is not tabular markup",

        4001 => "Variable is not defined",
        4002 => "Variable has no elements left",
        4003 => "Variable or value has the wrong kind",
        4004 => "Entry not found in variable",

        5001 => "Column index out of range for branch",

        6000 => "Generic persistence error",
        6001 => "Persistence I/O error",

        9000 => "Generic error",

        _ => "Unknown error code",
    }
}
