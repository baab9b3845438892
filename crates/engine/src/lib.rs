//! Client-side core of Isles.
//!
//! Screens mutate a working copy of the active game and its island list only
//! after the remote store has confirmed a change, then write the result to
//! the local snapshot store and re-render.

pub mod context;
pub mod error;
pub mod http;
pub mod islands;
pub mod presenter;
pub mod remote;
pub mod settings;
pub mod snapshot;
pub mod view;

pub use context::Context;
pub use error::{CommandError, Outcome};
pub use http::HttpRemote;
pub use islands::IslandBoard;
pub use presenter::Presenter;
pub use remote::RemoteStore;
pub use settings::SettingsScreen;
pub use snapshot::{MemorySnapshotStore, Namespace, SnapshotStore, SqliteSnapshotStore};
