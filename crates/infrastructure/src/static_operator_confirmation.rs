use allowgate_application::OperatorConfirmation;
use async_trait::async_trait;
use tracing::debug;

/// Confirmation that answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct StaticOperatorConfirmation {
    answer: bool,
}

impl StaticOperatorConfirmation {
    /// Accepts every prompt.
    #[must_use]
    pub fn approve_all() -> Self {
        Self { answer: true }
    }

    /// Declines every prompt.
    #[must_use]
    pub fn decline_all() -> Self {
        Self { answer: false }
    }
}

#[async_trait]
impl OperatorConfirmation for StaticOperatorConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        debug!(prompt = prompt, answer = self.answer, "static confirmation answered");
        self.answer
    }
}
