//! # Warden (Account Security Core)
//!
//! `warden` is the authentication, credential, and session-state core:
//! the pluggable [`auth::Authenticator`], [`accounts::AccountManager`],
//! and [`keys::KeyManager`] abstractions, the [`crypto`] primitives,
//! and the per-request [`session::SessionAuthority`] state machine that
//! gates every incoming request on account status, lockout,
//! online-reset configuration, and auth-token validity.
//!
//! ## Store Model
//!
//! Durable state lives behind the [`credentials::CredentialStore`] and
//! [`accounts::AccountStore`] traits. PostgreSQL backends ship for
//! production (`sql/schema.sql` has the layout) alongside in-memory
//! backends for embedding and tests. Every write is checked against an
//! affected-row count of exactly one; violations surface as errors
//! instead of being silently ignored.
//!
//! ## Credential Handling
//!
//! Hashing happens strictly upstream of the authenticator: callers
//! derive password and answer hashes with [`crypto::hash_secret`] and
//! only derived values cross the store boundary. Auth tokens are
//! re-derived from a per-account token salt on every request; there is
//! no cross-request cache, so administrative revocation takes effect on
//! the next request.
//!
//! ## Failure Discipline
//!
//! Component errors are typed ([`error::Error`]) and the session
//! authority maps every kind onto a redirect decision. Anything it does
//! not recognize fails closed: the session is invalidated rather than
//! let through.

pub mod accounts;
pub mod auth;
pub mod cli;
pub mod credentials;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod policy;
pub mod session;
pub mod sync;

pub(crate) mod store;

pub use error::{Error, Result};
pub use policy::SecurityPolicy;
