//! Delimited-text output for logbook streams.
//!
//! Rows are written and flushed as they arrive so output appears
//! incrementally; an error from the stream ends the output after the rows
//! already written.

use futures::stream::{Stream, StreamExt};
use std::io::Write;
use thiserror::Error;
use tracing::debug;

use crate::config::OutputSettings;
use crate::error::BoardError;
use crate::logbook::{LOGBOOK_FIELDS, LogbookEntry};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("failed to encode record: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("delimiter must be a single ASCII character other than a quote or line break, got '{0}'")]
    InvalidDelimiter(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOptions {
    pub headers: bool,
    pub delimiter: u8,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            headers: true,
            delimiter: b',',
        }
    }
}

impl TryFrom<&OutputSettings> for SinkOptions {
    type Error = SinkError;

    fn try_from(settings: &OutputSettings) -> Result<Self, Self::Error> {
        let delimiter = settings.delimiter;
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\n' | '\r') {
            return Err(SinkError::InvalidDelimiter(delimiter));
        }

        Ok(Self {
            headers: settings.headers,
            delimiter: delimiter as u8,
        })
    }
}

/// Write every entry of `entries` to `out`, returning the number of rows.
///
/// The header row, unless disabled, is written before the first entry is
/// requested, so it is present even for an empty logbook.
pub async fn write_logbook<S, W>(
    mut entries: S,
    out: W,
    options: SinkOptions,
) -> Result<usize, SinkError>
where
    S: Stream<Item = Result<LogbookEntry, BoardError>> + Unpin,
    W: Write,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(options.delimiter)
        .from_writer(out);

    if options.headers {
        writer.write_record(LOGBOOK_FIELDS)?;
        writer.flush()?;
    }

    let mut rows = 0;
    while let Some(entry) = entries.next().await {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                writer.flush()?;
                return Err(e.into());
            }
        };

        writer.serialize(&entry)?;
        writer.flush()?;
        rows += 1;
    }

    debug!(rows, "Logbook written");
    Ok(rows)
}
