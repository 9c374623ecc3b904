//! Thin wrapper around the system C compiler driver, used to assemble and
//! link the generated `.s` file into an executable.

use std::io;
use std::process::{Command, Output};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("assembler driver exited with code {0}: {1}")]
    ExitFailure(i32, String),
    #[error("no suitable assembler driver (cc, gcc or clang) found in $PATH")]
    NotFound,
}

fn detect_driver() -> Result<String, AssembleError> {
    fn is_available(binary: &str) -> bool {
        Command::new(binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    for candidate in ["cc", "gcc", "clang"] {
        if is_available(candidate) {
            return Ok(candidate.to_string());
        }
    }

    Err(AssembleError::NotFound)
}

/// Assemble and link a generated `.s` file into an executable.
///
/// * `src_path` – path to the assembly file
/// * `out_path` – desired output executable path
pub fn assemble(src_path: &str, out_path: &str) -> Result<(), AssembleError> {
    let driver = detect_driver()?;

    let mut cmd = Command::new(&driver);
    cmd.arg(src_path).arg("-o").arg(out_path);

    let Output { status, stderr, .. } = cmd.output()?;

    if status.success() {
        Ok(())
    } else {
        let code = status.code().unwrap_or(-1);
        Err(AssembleError::ExitFailure(
            code,
            String::from_utf8_lossy(&stderr).into(),
        ))
    }
}
