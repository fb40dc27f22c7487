mod args;
mod paths;

pub use args::{Cli, Commands, RunArgs};
pub use paths::resolve_document;
