use std::error::Error as StdError;
use std::path::Path;

use thiserror::Error;

pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = GptBotError> = std::result::Result<T, E>;

/// Errors surfaced by a single gptbot invocation.
///
/// `File` and `Api` keep the underlying failure, when there is one, so the
/// full chain can be printed at the top level.
#[derive(Debug, Error)]
pub enum GptBotError {
    #[error("{message}")]
    File {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("{message}")]
    Api {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("{0}")]
    Validation(String),
}

impl GptBotError {
    pub fn file(message: impl Into<String>) -> Self {
        Self::File {
            message: message.into(),
            source: None,
        }
    }

    pub fn file_with(message: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self::File {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn file_unreadable(path: &Path, source: Option<Cause>) -> Self {
        Self::File {
            message: format!("Unreadable file at path: {}", path.display()),
            source,
        }
    }

    pub fn file_unwritable(path: &Path, source: impl Into<Cause>) -> Self {
        Self::file_with(
            format!("Unwritable output file at path: {}", path.display()),
            source,
        )
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            source: None,
        }
    }

    pub fn api_with(message: impl Into<String>, source: impl Into<Cause>) -> Self {
        Self::Api {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[cfg(test)]
    pub(crate) fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
