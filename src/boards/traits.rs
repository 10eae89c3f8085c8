use async_trait::async_trait;
use futures::stream::BoxStream;

use super::types::{Credentials, RawAscent, ResolvedBoard, SessionHandle};
use super::BoardFamily;
use crate::error::BoardError;

/// Lazy, finite sequence of raw ascents; pages are fetched as it is polled
pub type AscentStream = BoxStream<'static, Result<RawAscent, BoardError>>;

/// Authentication and record retrieval for one board family
///
/// A session is created per run and holds no state between runs. The handle
/// returned by `authenticate` is owned by the caller and passed back to
/// `fetch_ascents`.
#[async_trait]
pub trait BoardSession: Send + Sync {
    /// Exchange credentials for a session handle.
    ///
    /// Fails with [`BoardError::Authentication`] when the backend rejects the
    /// credentials and [`BoardError::Transport`] when it cannot be reached.
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, BoardError>;

    /// Start streaming the logbook from its first page.
    ///
    /// Every call returns a fresh stream. Dropping the stream before it ends
    /// cancels any in-flight request.
    ///
    /// A record the backend delivered but that cannot be read is yielded as
    /// [`BoardError::MalformedRecord`] and the stream continues. Any other
    /// error is the last item.
    fn fetch_ascents(&self, handle: &SessionHandle) -> AscentStream;
}

/// Session factory for one board family, registered in the board registry
pub trait BoardProvider: Send + Sync {
    fn family(&self) -> BoardFamily;

    /// Board identifiers this provider lists as known
    fn identifiers(&self) -> Vec<String>;

    /// Whether this provider is responsible for `board`
    fn claims(&self, board: &str) -> bool;

    /// Create a session for a board this provider claimed
    fn open(&self, board: &ResolvedBoard) -> Result<Box<dyn BoardSession>, BoardError>;
}
