//! Console view renderer. Logs every rendered screen to tracing output.

use allowgate_application::ViewRenderer;
use allowgate_core::Identity;
use allowgate_domain::{AllowListSnapshot, SubView};
use tracing::info;

/// Headless renderer that writes the active screen to the log.
#[derive(Debug, Clone)]
pub struct ConsoleViewRenderer;

impl ConsoleViewRenderer {
    /// Creates a new console renderer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleViewRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRenderer for ConsoleViewRenderer {
    fn render_pending(&self) {
        info!(screen = "loading", "Loading...");
    }

    fn render_granted(&self, sub_view: SubView, allow_list: &AllowListSnapshot) {
        match sub_view {
            SubView::Piano => info!(screen = "app", view = sub_view.as_str(), "Access granted"),
            SubView::Admin => {
                let listing = if allow_list.is_empty() {
                    "No users in the allowed list yet.".to_owned()
                } else {
                    allow_list
                        .entries()
                        .iter()
                        .map(|entry| {
                            let added = entry
                                .timestamp_iso()
                                .map(|timestamp| format!(" (added {timestamp})"))
                                .unwrap_or_default();
                            format!("  {}{added}", entry.identity())
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                };

                info!(
                    screen = "app",
                    view = sub_view.as_str(),
                    entries = allow_list.len(),
                    "--- ALLOWED USERS ---\n{}\n--- END ALLOWED USERS ---",
                    listing
                );
            }
        }
    }

    fn render_denied(&self, identity: &Identity) {
        info!(
            screen = "denied",
            identity = %identity,
            "Access denied. Share your user ID with an administrator: {}",
            identity
        );
    }
}
