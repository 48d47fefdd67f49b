//! pageaudit command-line front end: configuration, rendering, errors.

pub mod config;
pub mod error;
pub mod render;

pub use config::{resolve_config_path, AuditConfig};
pub use error::{CliError, CliResult};
pub use render::{render, render_text, OutputFormat};
