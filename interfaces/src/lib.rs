pub mod defs;
pub mod empty;
pub mod state;

pub use defs::{ErrorRecord, ErrorSink, Link, NewsItem, RedditUser, Settings, Subreddit};
pub use empty::NullErrorSink;
pub use state::MemoryErrorSink;
