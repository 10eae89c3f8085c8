//! Board backends for boardlog
//!
//! Each board family speaks its own protocol. This module provides the
//! session trait every family implements and the registry that maps a board
//! identifier to the family responsible for it.
//!
//! ## Key Components
//!
//! - [`BoardSession`] - Authentication and lazy ascent streaming for one run
//! - [`BoardProvider`] - Session factory registered per board family
//! - [`BoardRegistry`] - Ordered provider list resolving board identifiers
//! - [`moon`] / [`aurora`] - The two built-in families
//!
//! ## Example
//!
//! ```rust,ignore
//! use boardlog::boards::{BoardRegistry, Credentials, Secret};
//!
//! let registry = BoardRegistry::with_defaults(&config, http);
//! let session = registry.resolve("kilter")?.open()?;
//!
//! let handle = session
//!     .authenticate(&Credentials::new("alex", Secret::new("hunter2")))
//!     .await?;
//! let mut ascents = session.fetch_ascents(&handle);
//! while let Some(ascent) = ascents.next().await { /* ... */ }
//! ```

pub mod aurora;
pub mod moon;
mod registry;
mod traits;
mod types;

pub use aurora::AuroraProvider;
pub use moon::MoonProvider;
pub use registry::{BoardRegistry, Resolution};
pub use traits::{AscentStream, BoardProvider, BoardSession};
pub use types::{
    BoardFamily, Credentials, RawAscent, ResolvedBoard, Secret, SessionHandle,
    parse_backend_date,
};
