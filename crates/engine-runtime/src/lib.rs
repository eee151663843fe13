pub mod engine;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod summary;
