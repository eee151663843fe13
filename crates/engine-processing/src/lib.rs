pub mod chunk;
pub mod error;
pub mod stage;
pub mod transform;
