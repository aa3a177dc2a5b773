//! Errors surfaced by the binaries, with their exit codes.

use std::path::PathBuf;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Install target is not mounted from the host (exit code 2).
    #[error("{} is not a mountpoint\n\nRe-run this image with -v $HOME/.local/bin:{}", target.display(), target.display())]
    NotMounted { target: PathBuf },

    /// Bad command line (exit code 1).
    #[error("{0}")]
    Usage(String),

    /// Anything else (exit code 1).
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::NotMounted { .. } => 2,
            CliError::Usage(_) | CliError::Failed(_) => 1,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        CliError::Usage(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = CliError::NotMounted {
            target: PathBuf::from("/target"),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("-v $HOME/.local/bin:/target"));

        assert_eq!(CliError::usage("bad").exit_code(), 1);
        assert_eq!(CliError::from(anyhow::anyhow!("boom")).exit_code(), 1);
    }
}
