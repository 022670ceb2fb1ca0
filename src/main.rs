//! mqft utility - main entrypoint
// (c) 2026 The mqft authors

use std::process::ExitCode;

fn main() -> ExitCode {
    mqft::main(std::env::args_os())
}
