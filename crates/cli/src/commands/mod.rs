//! Command handlers for the insight CLI.

pub mod ask;
pub mod index_blogs;
pub mod serve;

pub use ask::AskCommand;
pub use index_blogs::IndexBlogsCommand;
pub use serve::ServeCommand;
