use allowgate_core::{AppError, Identity};

/// Characters of the granted identity echoed in a success message.
pub const STATUS_IDENTITY_PREVIEW_CHARS: usize = 8;

/// Characters of a backend error echoed in a failure message.
pub const STATUS_ERROR_MAX_CHARS: usize = 50;

/// Outcome class of an admin status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    /// The write went through.
    Success,
    /// The write was rejected or failed.
    Failure,
}

/// Operator-facing status line for an add operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminStatus {
    tone: StatusTone,
    message: String,
}

impl AdminStatus {
    /// Status for a completed grant.
    #[must_use]
    pub fn entry_added(identity: &Identity) -> Self {
        Self {
            tone: StatusTone::Success,
            message: format!(
                "User {}... added successfully!",
                truncate_chars(identity.as_str(), STATUS_IDENTITY_PREVIEW_CHARS)
            ),
        }
    }

    /// Status for a rejected or failed grant.
    ///
    /// Backend messages are cut to [`STATUS_ERROR_MAX_CHARS`] characters.
    #[must_use]
    pub fn add_failed(error: &AppError) -> Self {
        let message = match error {
            AppError::Validation(_) => {
                "Please enter a valid UID (must be a long string).".to_owned()
            }
            AppError::Forbidden(message) | AppError::Authentication(message) => message.clone(),
            other => format!(
                "Error adding user: {}...",
                truncate_chars(other.message(), STATUS_ERROR_MAX_CHARS)
            ),
        };

        Self {
            tone: StatusTone::Failure,
            message,
        }
    }

    /// Returns the outcome class.
    #[must_use]
    pub fn tone(&self) -> StatusTone {
        self.tone
    }

    /// Returns whether the write went through.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.tone == StatusTone::Success
    }

    /// Returns the text shown to the operator.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => &value[..index],
        None => value,
    }
}
