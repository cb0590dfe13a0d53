/*!
Command layer.

  invoke.rs    InvokeArgs + execute_invoke (the only command)
  describe.rs  fixed-width function metadata listing
  format.rs    banner / color / value rendering helpers

Conventions:
  - The command exposes one public `execute_*` entry point returning an
    `Outcome` that `main` turns into the exit code.
  - Argument structs derive `clap::Args` and are flattened into `Cli`.
*/

pub mod describe;
pub mod format;
pub mod invoke;

pub use invoke::{InvokeArgs, execute_invoke};
