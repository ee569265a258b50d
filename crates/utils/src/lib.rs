//! Pure helpers shared by the CLI and the HTTP server: analytics, formatting
//! and output rendering.

pub mod analytics;
pub mod format;
pub mod output;
pub mod parse;
