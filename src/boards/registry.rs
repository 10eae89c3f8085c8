use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::aurora::AuroraProvider;
use super::moon::MoonProvider;
use super::traits::{BoardProvider, BoardSession};
use super::types::ResolvedBoard;
use crate::config::Config;
use crate::error::BoardError;
use crate::http::HttpClient;

/// Board identifier resolved to the provider responsible for it
#[derive(Clone)]
pub struct Resolution {
    board: ResolvedBoard,
    provider: Arc<dyn BoardProvider>,
}

impl Resolution {
    pub fn board(&self) -> &ResolvedBoard {
        &self.board
    }

    /// Create a fresh session for this board
    pub fn open(&self) -> Result<Box<dyn BoardSession>, BoardError> {
        self.provider.open(&self.board)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("board", &self.board)
            .finish_non_exhaustive()
    }
}

/// Ordered list of board providers.
///
/// Identifier namespaces of different families may overlap, so providers are
/// consulted in registration order and the first one claiming a board wins.
/// [`BoardRegistry::with_defaults`] registers Moon before Aurora.
#[derive(Clone, Default)]
pub struct BoardRegistry {
    providers: Vec<Arc<dyn BoardProvider>>,
}

impl BoardRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Append a provider with lower priority than those already registered
    pub fn register(&mut self, provider: Arc<dyn BoardProvider>) {
        self.providers.push(provider);
    }

    /// Registry with the built-in Moon and Aurora providers
    pub fn with_defaults(config: &Config, http: HttpClient) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MoonProvider::new(config.moon.clone(), http.clone())));
        registry.register(Arc::new(AuroraProvider::new(config.aurora.clone(), http)));
        registry
    }

    /// Find the provider for `board`; no network access happens here
    pub fn resolve(&self, board: &str) -> Result<Resolution, BoardError> {
        let provider = self
            .providers
            .iter()
            .find(|provider| provider.claims(board))
            .ok_or_else(|| BoardError::UnknownBoard(board.to_string()))?;

        debug!(board, family = %provider.family(), "Board resolved");

        Ok(Resolution {
            board: ResolvedBoard {
                identifier: board.to_string(),
                family: provider.family(),
            },
            provider: provider.clone(),
        })
    }

    /// All known board identifiers, sorted
    pub fn identifiers(&self) -> Vec<String> {
        self.providers
            .iter()
            .flat_map(|provider| provider.identifiers())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
