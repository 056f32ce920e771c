//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod access;
mod allow_list;

pub use access::{AccessDecision, SubView};
pub use allow_list::{
    AllowListEntry, AllowListPath, AllowListSnapshot, GRANT_IDENTITY_MIN_LENGTH,
    validate_grant_identity,
};
