//! Application discovery, fuzzy name resolution, launching and closing.
//!
//! [`AppManager`] is the entry point: call [`AppManager::discover`] to build
//! the catalog, then resolve, launch or close by free-text name.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod launcher;
pub mod manager;
pub mod matcher;
pub mod model;
pub mod platform;
pub mod process;
pub mod sources;
pub mod terminator;

pub use catalog::{AppId, Catalog};
pub use config::{Config, load_config};
pub use launcher::{LaunchResult, Suggestion};
pub use manager::AppManager;
pub use matcher::MatchCandidate;
pub use model::{AppKind, ApplicationEntry};
pub use terminator::{CloseResult, CloseStatus};
