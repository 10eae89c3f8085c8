//! Grade translation between backend-native encodings and the Font / Hueco
//! output scales.
//!
//! Each board family delivers difficulty in its own encoding: Moon boards
//! report Font labels (`"6B+"`), Aurora boards report integer difficulty ids
//! (`18`). A [`GradeTable`] maps one encoding onto both output scales, and
//! [`GradeTables`] picks the table for a `(family, angle)` pair, falling back to
//! the family default when no angle-specific table is registered.
//!
//! Font output is always upper-case (`6B+`), Hueco output is `V<n>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::boards::BoardFamily;
use crate::error::BoardError;

/// Output scale requested for a run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GradeScale {
    #[default]
    Font,
    Hueco,
}

impl fmt::Display for GradeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeScale::Font => f.write_str("font"),
            GradeScale::Hueco => f.write_str("hueco"),
        }
    }
}

/// Backend-native grade encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradeEncoding {
    /// Font labels as shown in the Moon apps
    MoonFont,
    /// Integer difficulty ids shared by every Aurora deployment
    AuroraDifficulty,
}

impl fmt::Display for GradeEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeEncoding::MoonFont => f.write_str("moon font"),
            GradeEncoding::AuroraDifficulty => f.write_str("aurora difficulty"),
        }
    }
}

/// A grade exactly as the backend delivered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeGrade {
    Label(String),
    Difficulty(i64),
}

impl NativeGrade {
    fn key(&self) -> String {
        match self {
            NativeGrade::Label(label) => label.trim().to_ascii_uppercase(),
            NativeGrade::Difficulty(value) => value.to_string(),
        }
    }
}

impl fmt::Display for NativeGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeGrade::Label(label) => f.write_str(label),
            NativeGrade::Difficulty(value) => write!(f, "{}", value),
        }
    }
}

/// (native key, font, hueco)
pub type GradeRow = (&'static str, &'static str, &'static str);

const MOON_FONT_ROWS: &[GradeRow] = &[
    ("4", "4", "V0"),
    ("4+", "4+", "V0"),
    ("5", "5", "V1"),
    ("5+", "5+", "V2"),
    ("6A", "6A", "V3"),
    ("6A+", "6A+", "V3"),
    ("6B", "6B", "V4"),
    ("6B+", "6B+", "V4"),
    ("6C", "6C", "V5"),
    ("6C+", "6C+", "V5"),
    ("7A", "7A", "V6"),
    ("7A+", "7A+", "V7"),
    ("7B", "7B", "V8"),
    ("7B+", "7B+", "V8"),
    ("7C", "7C", "V9"),
    ("7C+", "7C+", "V10"),
    ("8A", "8A", "V11"),
    ("8A+", "8A+", "V12"),
    ("8B", "8B", "V13"),
    ("8B+", "8B+", "V14"),
    ("8C", "8C", "V15"),
    ("8C+", "8C+", "V16"),
];

const AURORA_DIFFICULTY_ROWS: &[GradeRow] = &[
    ("10", "4A", "V0"),
    ("11", "4B", "V0"),
    ("12", "4C", "V0"),
    ("13", "5A", "V1"),
    ("14", "5B", "V1"),
    ("15", "5C", "V2"),
    ("16", "6A", "V3"),
    ("17", "6A+", "V3"),
    ("18", "6B", "V4"),
    ("19", "6B+", "V4"),
    ("20", "6C", "V5"),
    ("21", "6C+", "V5"),
    ("22", "7A", "V6"),
    ("23", "7A+", "V7"),
    ("24", "7B", "V8"),
    ("25", "7B+", "V8"),
    ("26", "7C", "V9"),
    ("27", "7C+", "V10"),
    ("28", "8A", "V11"),
    ("29", "8A+", "V12"),
    ("30", "8B", "V13"),
    ("31", "8B+", "V14"),
    ("32", "8C", "V15"),
    ("33", "8C+", "V16"),
];

/// Lookup table for one native encoding
#[derive(Debug, Clone, Copy)]
pub struct GradeTable {
    encoding: GradeEncoding,
    rows: &'static [GradeRow],
}

impl GradeTable {
    pub const fn new(encoding: GradeEncoding, rows: &'static [GradeRow]) -> Self {
        Self { encoding, rows }
    }

    pub fn translate(&self, native: &NativeGrade, scale: GradeScale) -> Result<String, BoardError> {
        let key = native.key();
        self.rows
            .iter()
            .find(|(native_key, _, _)| *native_key == key)
            .map(|(_, font, hueco)| match scale {
                GradeScale::Font => font.to_string(),
                GradeScale::Hueco => hueco.to_string(),
            })
            .ok_or_else(|| BoardError::UnrecognizedGrade {
                encoding: self.encoding,
                value: native.to_string(),
            })
    }
}

impl GradeEncoding {
    pub fn default_table(self) -> GradeTable {
        match self {
            GradeEncoding::MoonFont => GradeTable::new(self, MOON_FONT_ROWS),
            GradeEncoding::AuroraDifficulty => GradeTable::new(self, AURORA_DIFFICULTY_ROWS),
        }
    }
}

/// Translate a native grade with the default table of its encoding
pub fn translate(
    native: &NativeGrade,
    encoding: GradeEncoding,
    scale: GradeScale,
) -> Result<String, BoardError> {
    encoding.default_table().translate(native, scale)
}

/// Grade tables keyed by `(family, angle)`, built once at start-up
#[derive(Debug, Clone, Default)]
pub struct GradeTables {
    tables: HashMap<(BoardFamily, Option<u16>), GradeTable>,
}

impl GradeTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Family defaults for every known board family
    pub fn standard() -> Self {
        let mut tables = Self::new();
        for family in [BoardFamily::Moon, BoardFamily::Aurora] {
            tables = tables.with_table(family, None, family.grade_encoding().default_table());
        }
        tables
    }

    /// Register a table; `angle = None` sets the family default
    pub fn with_table(mut self, family: BoardFamily, angle: Option<u16>, table: GradeTable) -> Self {
        self.tables.insert((family, angle), table);
        self
    }

    pub fn table_for(&self, family: BoardFamily, angle: Option<u16>) -> Option<&GradeTable> {
        angle
            .and_then(|angle| self.tables.get(&(family, Some(angle))))
            .or_else(|| self.tables.get(&(family, None)))
    }

    pub fn translate(
        &self,
        family: BoardFamily,
        angle: Option<u16>,
        native: &NativeGrade,
        scale: GradeScale,
    ) -> Result<String, BoardError> {
        match self.table_for(family, angle) {
            Some(table) => table.translate(native, scale),
            None => Err(BoardError::UnrecognizedGrade {
                encoding: family.grade_encoding(),
                value: native.to_string(),
            }),
        }
    }
}
