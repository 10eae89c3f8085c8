//! Logbook aggregation: dispatch, authenticate, stream and normalize.
//!
//! [`Aggregator::aggregate`] does all fallible setup (board resolution and
//! authentication) before it returns, so a caller either gets an error or a
//! [`Logbook`] stream; nothing is produced for a run that cannot start. The
//! stream then pulls raw ascents from the backend one page at a time and
//! converts each into a [`LogbookEntry`] in the order the backend delivered it.

use chrono::NaiveDate;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{info, warn};

use async_stream::try_stream;

use crate::boards::{AscentStream, BoardRegistry, Credentials, RawAscent, ResolvedBoard};
use crate::error::BoardError;
use crate::grades::{GradeScale, GradeTables};
use crate::observability::{RunSnapshot, RunStats};

/// Column order of every serialized logbook
pub const LOGBOOK_FIELDS: [&str; 6] = ["board", "angle", "name", "date", "grade", "tries"];

/// One normalized ascent; field order matches [`LOGBOOK_FIELDS`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogbookEntry {
    pub board: String,
    pub angle: Option<u16>,
    pub name: String,
    pub date: NaiveDate,
    pub grade: String,
    pub tries: u32,
}

/// What to do with a record that cannot be normalized: an unrecognized grade
/// or a malformed backend record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordPolicy {
    /// Log and drop the record, keep streaming
    #[default]
    Skip,
    /// Yield the error and end the stream
    Fail,
}

pub type LogbookStream = BoxStream<'static, Result<LogbookEntry, BoardError>>;

/// Lazy stream of normalized entries for one run
pub struct Logbook {
    board: ResolvedBoard,
    scale: GradeScale,
    entries: LogbookStream,
    stats: Arc<RunStats>,
}

impl Logbook {
    pub fn board(&self) -> &ResolvedBoard {
        &self.board
    }

    pub fn scale(&self) -> GradeScale {
        self.scale
    }

    pub fn stats(&self) -> RunSnapshot {
        self.stats.snapshot()
    }

    pub fn into_stream(self) -> LogbookStream {
        self.entries
    }
}

impl Stream for Logbook {
    type Item = Result<LogbookEntry, BoardError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.entries.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// Runs logbook retrievals against the registered board families.
///
/// Holds only immutable shared data, so one aggregator can serve any number
/// of concurrent runs.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<BoardRegistry>,
    grades: Arc<GradeTables>,
    policy: RecordPolicy,
}

impl Aggregator {
    pub fn new(registry: Arc<BoardRegistry>, grades: Arc<GradeTables>) -> Self {
        Self {
            registry,
            grades,
            policy: RecordPolicy::default(),
        }
    }

    pub fn with_record_policy(mut self, policy: RecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve `board`, authenticate, and return the lazy entry stream.
    ///
    /// Resolution happens before any network access. Authentication errors
    /// are returned unchanged. `credentials` are dropped once the backend has
    /// accepted them.
    pub async fn aggregate(
        &self,
        board: &str,
        credentials: Credentials,
        scale: GradeScale,
    ) -> Result<Logbook, BoardError> {
        let resolution = self.registry.resolve(board)?;
        let session = resolution.open()?;

        let handle = session.authenticate(&credentials).await?;
        drop(credentials);

        let resolved = resolution.board().clone();
        info!(
            board = %resolved.identifier,
            family = %resolved.family,
            %scale,
            "Streaming logbook"
        );

        let stats = Arc::new(RunStats::new());
        let entries = normalize(
            session.fetch_ascents(&handle),
            resolved.clone(),
            self.grades.clone(),
            scale,
            self.policy,
            stats.clone(),
        );

        Ok(Logbook {
            board: resolved,
            scale,
            entries,
            stats,
        })
    }
}

fn normalize(
    mut ascents: AscentStream,
    board: ResolvedBoard,
    grades: Arc<GradeTables>,
    scale: GradeScale,
    policy: RecordPolicy,
    stats: Arc<RunStats>,
) -> LogbookStream {
    Box::pin(try_stream! {
        while let Some(ascent) = ascents.next().await {
            let ascent = match ascent {
                Ok(ascent) => ascent,
                Err(err) if err.is_record_level() => {
                    stats.ascent_received();
                    match policy {
                        RecordPolicy::Skip => {
                            warn!(
                                board = %board.identifier,
                                error = %err,
                                "Skipping unreadable record"
                            );
                            stats.malformed_skipped();
                            continue;
                        }
                        RecordPolicy::Fail => Err::<RawAscent, BoardError>(err)?,
                    }
                }
                Err(err) => Err::<RawAscent, BoardError>(err)?,
            };
            stats.ascent_received();

            match project(&board.identifier, &grades, scale, &ascent) {
                Ok(entry) => {
                    stats.entry_emitted();
                    yield entry;
                }
                Err(err) => match policy {
                    RecordPolicy::Skip => {
                        warn!(
                            board = %board.identifier,
                            climb = %ascent.name,
                            date = %ascent.date,
                            error = %err,
                            "Skipping ascent"
                        );
                        stats.grade_skipped();
                    }
                    RecordPolicy::Fail => Err::<(), BoardError>(err)?,
                },
            }
        }

        let summary = stats.snapshot();
        info!(
            board = %board.identifier,
            entries = summary.entries_emitted,
            unrecognized_grades = summary.grades_skipped,
            malformed = summary.malformed_skipped,
            "Logbook complete"
        );
    })
}

/// Translate the grade and project a raw ascent onto the output schema
pub fn project(
    board: &str,
    grades: &GradeTables,
    scale: GradeScale,
    ascent: &RawAscent,
) -> Result<LogbookEntry, BoardError> {
    let grade = grades.translate(ascent.family, ascent.angle, &ascent.grade, scale)?;

    Ok(LogbookEntry {
        board: board.to_string(),
        angle: ascent.angle,
        name: ascent.name.clone(),
        date: ascent.date,
        grade,
        tries: ascent.tries,
    })
}
