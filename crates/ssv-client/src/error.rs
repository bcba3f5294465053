use ssv_core::SpreadsheetId;

pub type ClientResult<T> = Result<T, ClientError>;

/// Failure talking to the data server.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// HTTP 401; the UI layer is expected to send the user to login.
    #[error("Not authenticated (HTTP 401)")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Unknown spreadsheet: {0}")]
    UnknownSpreadsheet(SpreadsheetId),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }
}
