//! Helpers for invoking external command-line tools.

use std::process::{ExitStatus, Output};

use thiserror::Error;

/// Failure running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("External tool not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `name` resolves to an executable on `PATH` (or is a usable path).
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Stdout of a finished command, or the matching error.
pub(crate) fn handle_cmd_output(
    result: std::io::Result<Output>,
    tool_hint: &str,
    error_prefix: &str,
) -> Result<String, ToolError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ToolError::Failed(format!("{}: {}", error_prefix, stderr.trim())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolError::NotFound(tool_hint.to_string()))
        }
        Err(e) => Err(ToolError::Io(e)),
    }
}

pub(crate) fn check_cmd_status(
    result: std::io::Result<ExitStatus>,
    tool_hint: &str,
    error_msg: &str,
) -> Result<(), ToolError> {
    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(ToolError::Failed(format!("{} ({})", error_msg, status))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolError::NotFound(tool_hint.to_string()))
        }
        Err(e) => Err(ToolError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_missing_tool_is_not_found() {
        let result = Command::new("docscan-no-such-tool-xyz").output();
        let err = handle_cmd_output(result, "docscan-no-such-tool-xyz", "failed").unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
        assert!(!check_binary("docscan-no-such-tool-xyz"));
    }
}
