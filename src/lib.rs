//
// lib.rs
// spherical-tools
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//

// Public surface of the library: each module mirrors a CLI concern or shared utility.
pub mod cli;
pub mod crop;
pub mod inject;
pub mod metadata;
pub mod models;
pub mod mp4;
pub mod spherical;
pub mod xml;

pub use cli::{run as run_cli, Cli};
