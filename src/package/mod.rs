//! Package definitions and built package files.
//!
//! - `template`: copies a stage template and substitutes the version tokens
//! - `artifact`: finds `*.pkg.tar.*` files and copies them to the destination

pub mod artifact;
pub mod template;

pub use artifact::{copy_artifacts, newest_artifacts, scan_artifacts};
pub use template::{expand_template, substitute_tokens};
