//! Data models for the dashboard hub.
//!
//! Resource models are read-only snapshots of Azure state; notices are the only
//! records this service owns.

mod chat;
mod container;
mod dashboard;
mod notice;
mod search;

pub use chat::*;
pub use container::*;
pub use dashboard::*;
pub use notice::*;
pub use search::*;
