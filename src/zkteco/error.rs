use thiserror::Error;

/// Failures raised while talking the ZKTeco wire protocol.
#[derive(Debug, Error)]
pub enum ZkError {
    #[error("Timeout waiting for {0}")]
    Timeout(&'static str),

    #[error("{context} failed: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by device during {0}")]
    Closed(&'static str),

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    #[error("Unexpected reply {code} ({name})")]
    UnexpectedReply { code: u16, name: &'static str },

    #[error("Device authentication failed: {0}")]
    Auth(String),

    #[error("Malformed device data: {0}")]
    Malformed(&'static str),
}

impl ZkError {
    pub(crate) fn unexpected(code: u16) -> ZkError {
        ZkError::UnexpectedReply {
            code,
            name: super::protocol::command_name(code),
        }
    }

    pub(crate) fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> ZkError {
        move |source| ZkError::Io { context, source }
    }
}

pub type ZkResult<T> = Result<T, ZkError>;
