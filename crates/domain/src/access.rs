use std::str::FromStr;

use allowgate_core::{AppError, Identity};
use serde::{Deserialize, Serialize};

use crate::AllowListSnapshot;

/// Sub-views reachable once access is granted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubView {
    /// The shared application.
    #[default]
    Piano,
    /// Allow-list management.
    Admin,
}

impl SubView {
    /// Returns the stable view id.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Piano => "piano",
            Self::Admin => "admin",
        }
    }

    /// Returns all known sub-views.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[SubView] = &[SubView::Piano, SubView::Admin];

        ALL
    }
}

impl FromStr for SubView {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "piano" => Ok(Self::Piano),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::Validation(format!("unknown view id '{other}'"))),
        }
    }
}

/// Which of the three top-level states the session shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Identity or the first allow-list delivery is still outstanding.
    Pending,
    /// The caller is on the allow-list.
    Granted {
        /// Sub-view to show.
        sub_view: SubView,
    },
    /// The caller is not on the allow-list.
    Denied {
        /// The caller's own identity, shown so it can be granted.
        identity: Identity,
    },
}

impl AccessDecision {
    /// Evaluates the decision from the current identity and allow-list.
    ///
    /// `snapshot` is `None` until the first delivery of the session arrives.
    #[must_use]
    pub fn evaluate(
        identity: Option<&Identity>,
        snapshot: Option<&AllowListSnapshot>,
        sub_view: SubView,
    ) -> Self {
        let (Some(identity), Some(snapshot)) = (identity, snapshot) else {
            return Self::Pending;
        };

        if snapshot.contains(identity) {
            Self::Granted { sub_view }
        } else {
            Self::Denied {
                identity: identity.clone(),
            }
        }
    }

    /// Returns whether the caller may see the application.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    /// Returns a stable label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Granted { .. } => "granted",
            Self::Denied { .. } => "denied",
        }
    }
}
