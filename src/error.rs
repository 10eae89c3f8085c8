use thiserror::Error;

use crate::grades::GradeEncoding;

/// Failure surface of a logbook run.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("unknown board: {0}")]
    UnknownBoard(String),
    #[error("authentication failed for {board}: {reason}")]
    Authentication { board: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unrecognized {encoding} grade: {value}")]
    UnrecognizedGrade {
        encoding: GradeEncoding,
        value: String,
    },
    /// One backend record could not be read; the rest of the stream is unaffected
    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownBoard,
    Authentication,
    Transport,
    UnrecognizedGrade,
    MalformedRecord,
}

impl BoardError {
    pub fn authentication(board: impl Into<String>, reason: impl Into<String>) -> Self {
        BoardError::Authentication {
            board: board.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::UnknownBoard(_) => ErrorKind::UnknownBoard,
            BoardError::Authentication { .. } => ErrorKind::Authentication,
            BoardError::Transport(_) => ErrorKind::Transport,
            BoardError::UnrecognizedGrade { .. } => ErrorKind::UnrecognizedGrade,
            BoardError::MalformedRecord(_) => ErrorKind::MalformedRecord,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BoardError::UnknownBoard(_) => "UNKNOWN_BOARD",
            BoardError::Authentication { .. } => "AUTHENTICATION",
            BoardError::Transport(_) => "TRANSPORT",
            BoardError::UnrecognizedGrade { .. } => "UNRECOGNIZED_GRADE",
            BoardError::MalformedRecord(_) => "MALFORMED_RECORD",
        }
    }

    /// Only transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BoardError::Transport(_))
    }

    /// Errors confined to a single record; streams keep going after them
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            BoardError::UnrecognizedGrade { .. } | BoardError::MalformedRecord(_)
        )
    }
}

impl From<reqwest::Error> for BoardError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            BoardError::Transport(format!("request timed out: {}", value))
        } else if value.is_decode() {
            BoardError::Transport(format!("malformed response body: {}", value))
        } else {
            BoardError::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(value: serde_json::Error) -> Self {
        BoardError::Transport(format!("malformed response body: {}", value))
    }
}
