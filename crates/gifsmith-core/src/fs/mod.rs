//! Filesystem utilities: scoped temp workspaces and path validation.

mod paths;
mod workspace;

pub use paths::{tool_path_arg, validate_input_path, validate_output_path};
pub use workspace::TempWorkspace;
