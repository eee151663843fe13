pub mod format;
pub mod memory;
pub mod sink;
pub mod source;
