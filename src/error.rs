//! Application error type.
//!
//! The yield core never fails on malformed rows; errors only come from the
//! edges (CLI values, files, the HTTP source, the settings file). Each error
//! carries the process exit code `yt` should terminate with.

/// Bad CLI value or unreadable/malformed input file.
pub const EXIT_USAGE: u8 = 2;
/// The selected data produced no usable statistics.
pub const EXIT_NO_DATA: u8 = 3;
/// A collaborator (HTTP source, settings persistence) failed.
pub const EXIT_COLLABORATOR: u8 = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(EXIT_NO_DATA, message)
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::new(EXIT_COLLABORATOR, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
