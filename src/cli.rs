//! Command line interface: `train`, `predict`, `repl` and `inspect`.

pub mod args;
pub mod commands;
pub mod output;

pub use args::*;
pub use commands::*;
pub use output::*;
