pub mod news;
pub mod reddit;

pub use news::NewsContentBuilder;
pub use reddit::{Listing, RedditContentBuilder};
