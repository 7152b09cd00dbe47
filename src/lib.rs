//! feedrack: a launcher-plugin core that aggregates RSS/Atom/JSON feeds.
//!
//! The host launcher drives an [`Engine`]: it answers search queries with
//! display records, executes activated records (marking items read and
//! reporting which URL to open), and keeps the feed collection fresh via
//! a periodic, overlap-safe refresh task. Read markers and last-access
//! times persist across restarts through the host's key-value storage
//! ([`KeyValue`]).

pub mod config;
pub mod engine;
pub mod feed;
pub mod preview;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod view;

pub use config::Config;
pub use engine::{Effect, Engine};
pub use feed::{FeedItem, FetchedFeed};
pub use storage::{JsonFileStore, KeyValue, MemoryStore};
pub use view::{DisplayRecord, FeedsOrder, OpenPayload};
