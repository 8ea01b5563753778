/// Grouped undo/redo history.
///
/// Provides an `UndoRedoEngine` that books reversible changes (mementos)
/// into logical operations, replays them in reverse on undo, and captures
/// whatever the replay books as the matching redo step. Grouping follows
/// memento significance and explicit operation boundaries.
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod memento;
pub mod notify;
mod policy;
mod store;

pub use config::HistoryConfig;
pub use engine::{Mode, UndoRedoEngine};
pub use error::{HistoryError, StateViolation};
pub use group::OperationGroup;
pub use memento::{Memento, Significance};
pub use notify::{HistoryEvent, ListenerId};
