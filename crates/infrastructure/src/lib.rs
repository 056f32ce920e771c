//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_view_renderer;
mod firebase_config;
mod firebase_identity_provider;
mod firebase_rest;
mod firebase_session;
mod firestore_allow_list_store;
mod in_memory_allow_list_store;
mod in_memory_identity_provider;
mod static_operator_confirmation;

pub use console_view_renderer::ConsoleViewRenderer;
pub use firebase_config::{
    DEFAULT_FIRESTORE_URL, DEFAULT_IDENTITY_TOOLKIT_URL, DEFAULT_SECURE_TOKEN_URL, FirebaseConfig,
};
pub use firebase_identity_provider::FirebaseIdentityProvider;
pub use firebase_session::FirebaseSession;
pub use firestore_allow_list_store::{FIRESTORE_PAGE_SIZE, FirestoreAllowListStore};
pub use in_memory_allow_list_store::InMemoryAllowListStore;
pub use in_memory_identity_provider::InMemoryIdentityProvider;
pub use static_operator_confirmation::StaticOperatorConfirmation;
