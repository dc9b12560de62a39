pub mod capsule;
pub mod indexer;
