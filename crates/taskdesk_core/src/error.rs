use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    InvalidInput(String),
    InvalidData(String),
    Io(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message) | Self::InvalidData(message) | Self::Io(message) => {
                message
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}

/// Reasons a persisted blob could not be brought up to the current schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    MalformedEnvelope(String),
    MigrationGap { version: u64 },
}

impl MigrationError {
    pub fn malformed<M: Into<String>>(message: M) -> Self {
        Self::MalformedEnvelope(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::MigrationGap { .. } => "migration_gap",
        }
    }
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEnvelope(message) => write!(f, "{} - {}", self.code(), message),
            Self::MigrationGap { version } => write!(
                f,
                "{} - no migration registered for version {}",
                self.code(),
                version
            ),
        }
    }
}

impl std::error::Error for MigrationError {}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        AppError::invalid_data(err.to_string())
    }
}
