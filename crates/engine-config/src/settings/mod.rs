pub mod error;
pub mod output;
pub mod validated;

pub use error::SettingsError;
pub use output::OutputSettings;
pub use validated::RunSettings;
