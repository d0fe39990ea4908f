use std::time::Duration;

/// An error executing a GraphQL request against the platform API.
///
/// Transport-level success does not imply application-level success: a
/// well-formed response envelope containing a GraphQL `errors` list is
/// *not* an error here, it is surfaced to the caller as payload.
#[derive(Debug, thiserror::Error)]
pub enum GraphQLError {
    /// The request was rejected before any network call was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No response within the configured timeout.
    #[error("request timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Connection failure, malformed HTTP, or a non-2xx status.
    #[error("transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The response body was not valid JSON.
    #[error("could not decode response body: {0}")]
    Decode(String),
}

impl GraphQLError {
    /// Failure kind name, used when rendering batch items.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphQLError::InvalidRequest(_) => "invalid_request",
            GraphQLError::Timeout { .. } => "timeout",
            GraphQLError::Transport { .. } => "transport_error",
            GraphQLError::Decode(_) => "decode_error",
        }
    }
}

/// An error evaluating a projection expression.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("could not parse filter expression: {0}")]
    Parse(String),

    #[error("filter evaluation failed: {0}")]
    Eval(String),
}

/// Entity resolution failed outright.
///
/// Only produced when every per-kind lookup failed; a single failing
/// kind during an any-kind search degrades to omitting that kind.
#[derive(Debug, thiserror::Error)]
#[error("entity resolution failed for all kinds: {0}")]
pub struct ResolutionError(pub String);

/// An error in server startup.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to initialize MCP server: {0}")]
    McpInitialize(Box<rmcp::service::ServerInitializeError>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Box<rmcp::service::ServerInitializeError>> for ServerError {
    fn from(e: Box<rmcp::service::ServerInitializeError>) -> Self {
        ServerError::McpInitialize(e)
    }
}

/// An MCP tool error
pub type McpError = rmcp::model::ErrorData;
