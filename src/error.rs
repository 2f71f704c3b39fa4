//! Error types for talking to the music daemon.
//!
//! Two layers:
//!
//! - [`TransportError`]: what a single protocol call can fail with. The
//!   executor inspects it to decide whether a reconnect-and-retry applies.
//! - [`Error`]: what callers of the public operations see. Transport faults
//!   never leak through unclassified.

use std::path::PathBuf;

/// Result type for public operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for a single transport call.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// MPD `ACK` error codes we react to.
pub mod ack {
    pub const ARG: u16 = 2;
    pub const PASSWORD: u16 = 3;
    pub const PERMISSION: u16 = 4;
    pub const UNKNOWN: u16 = 5;
    pub const NO_EXIST: u16 = 50;
    pub const PLAYLIST_MAX: u16 = 51;
    pub const SYSTEM: u16 = 52;
    pub const PLAYLIST_LOAD: u16 = 53;
    pub const UPDATE_ALREADY: u16 = 54;
    pub const PLAYER_SYNC: u16 = 55;
    pub const EXIST: u16 = 56;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket severed, refused, or timed out.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// No live transport handle to run the command on.
    #[error("not connected to the music daemon")]
    NotConnected,

    /// The daemon answered with `ACK`.
    #[error("{message}")]
    Rejected { code: Option<u16>, message: String },

    /// Unparseable or unexpected response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn rejected(code: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// Connection-class failures are the only ones worth a reconnect.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::NotConnected)
    }
}

impl From<mpd::error::Error> for TransportError {
    fn from(err: mpd::error::Error) -> Self {
        match err {
            mpd::error::Error::Io(io) => Self::Connection(io),
            mpd::error::Error::Server(server) => {
                let code = ack_code_from_name(&format!("{:?}", server.code));
                Self::Rejected {
                    code,
                    message: server.detail,
                }
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Maps the `mpd` crate's error-code variant names onto numeric ACK codes.
fn ack_code_from_name(name: &str) -> Option<u16> {
    let code = match name {
        "Argument" => ack::ARG,
        "Password" => ack::PASSWORD,
        "Permission" => ack::PERMISSION,
        "UnknownCmd" => ack::UNKNOWN,
        "NoExist" => ack::NO_EXIST,
        "PlaylistMax" => ack::PLAYLIST_MAX,
        "System" => ack::SYSTEM,
        "PlaylistLoad" => ack::PLAYLIST_LOAD,
        "UpdateAlready" => ack::UPDATE_ALREADY,
        "PlayerSync" => ack::PLAYER_SYNC,
        "Exist" => ack::EXIST,
        _ => return None,
    };
    Some(code)
}

/// Failures visible to the API layer, scheduler and other collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Daemon unreachable; the feature is temporarily unavailable.
    #[error("music daemon unavailable: {0}")]
    Unavailable(String),

    /// The daemon refused the command after a successful connection.
    #[error("music daemon rejected command: {message}")]
    CommandRejected { code: Option<u16>, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// Requested path escapes the music root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("daemon connection lock poisoned")]
    Poisoned,
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(io) => Self::Unavailable(io.to_string()),
            TransportError::NotConnected => Self::Unavailable("not connected".to_string()),
            TransportError::Rejected { code, message } => Self::CommandRejected { code, message },
            TransportError::Protocol(msg) => Self::Protocol(msg),
        }
    }
}

impl Error {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Status code a web front-end should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::CommandRejected { code, .. } => match *code {
                Some(ack::NO_EXIST) => 404,
                Some(ack::EXIST) => 409,
                Some(ack::ARG) => 400,
                _ => 500,
            },
            Self::InvalidPath(_) | Self::InvalidArgument(_) => 400,
            Self::NotFound(_) => 404,
            Self::Protocol(_) | Self::Poisoned => 500,
        }
    }
}
