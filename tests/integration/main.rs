mod git;
mod indexing;
mod retrieval;
mod watcher;
