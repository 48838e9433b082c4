//! Refresh orchestration: pause token, progress updates and the indexer

mod indexer;
mod pause;
mod progress;

pub use indexer::CodebaseIndexer;
pub use pause::PauseToken;
pub use progress::{IndexingProgressUpdate, IndexingStatus};
