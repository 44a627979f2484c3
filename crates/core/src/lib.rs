pub mod config;
pub mod error;
pub mod options;
pub mod properties;
pub mod result;

pub use config::Config;
pub use error::*;
pub use options::{apply_options, IngestMode, IngestOption};
pub use properties::*;
pub use result::*;
