//! Application services and ports.

#![forbid(unsafe_code)]

mod access_synchronizer;
mod admin_mutation_service;
mod admin_status;
mod session_bootstrap;
mod session_controls;
mod session_events;
mod session_ports;

#[cfg(test)]
mod test_support;

pub use access_synchronizer::{AccessSynchronizer, ResubscribePolicy, SessionView};
pub use admin_mutation_service::{AdminMutationService, RemovalOutcome};
pub use admin_status::{
    AdminStatus, STATUS_ERROR_MAX_CHARS, STATUS_IDENTITY_PREVIEW_CHARS, StatusTone,
};
pub use session_bootstrap::SessionBootstrap;
pub use session_controls::SessionControls;
pub use session_events::{
    SessionEvent, SessionEventReceiver, SessionEventSender, SnapshotSink, SubscriptionId,
    WeakSessionEventSender, session_event_channel,
};
pub use session_ports::{
    AllowListStore, IdentityProvider, OperatorConfirmation, SubscriptionHandle, ViewRenderer,
};
