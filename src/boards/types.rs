use chrono::NaiveDate;
use std::fmt;

use crate::error::BoardError;
use crate::grades::{GradeEncoding, NativeGrade};

/// Vendor protocol group sharing one authentication and pagination scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardFamily {
    Moon,
    Aurora,
}

impl BoardFamily {
    pub fn grade_encoding(self) -> GradeEncoding {
        match self {
            BoardFamily::Moon => GradeEncoding::MoonFont,
            BoardFamily::Aurora => GradeEncoding::AuroraDifficulty,
        }
    }
}

impl fmt::Display for BoardFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardFamily::Moon => f.write_str("moon"),
            BoardFamily::Aurora => f.write_str("aurora"),
        }
    }
}

/// String that never shows up in `Debug` output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Username and secret for one run; only the selected session reads them
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    secret: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: Secret) -> Self {
        Self {
            username: username.into(),
            secret,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        self.secret.expose()
    }
}

/// Authenticated state returned by [`super::BoardSession::authenticate`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    token: Secret,
    user_id: Option<u64>,
}

impl SessionHandle {
    pub fn new(token: impl Into<String>, user_id: Option<u64>) -> Self {
        Self {
            token: Secret::new(token),
            user_id,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose()
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }
}

/// Board identifier matched to a family by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBoard {
    pub identifier: String,
    pub family: BoardFamily,
}

/// One logged climb exactly as a backend reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAscent {
    pub family: BoardFamily,
    pub angle: Option<u16>,
    pub name: String,
    pub date: NaiveDate,
    pub grade: NativeGrade,
    pub tries: u32,
}

/// Parse the calendar date out of a backend timestamp.
///
/// Accepts `2023-05-01`, `2023-05-01 18:22:11.123456` and
/// `2023-05-01T18:22:11+02:00`; only the date part is kept.
pub fn parse_backend_date(value: &str) -> Result<NaiveDate, BoardError> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| BoardError::MalformedRecord(format!("date '{}': {}", value, e)))
}
