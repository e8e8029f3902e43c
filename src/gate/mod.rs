//! Token validation and authorization gate.
//!
//! Every call goes through the same steps:
//!
//! ```text
//! RequestContext
//!   -> extract credential            (none -> Unauthenticated)
//!   -> list onboarded namespaces     (cluster rejects credential -> Unauthenticated)
//!   -> probe: get namespaces/<first> (denied -> Unauthenticated)
//!   -> the caller's own question     (denied -> PermissionDenied)
//! ```
//!
//! Nothing is remembered between calls. The cluster is the source of truth
//! for both identity and policy, and either can change at any moment.

pub mod action;
pub mod delegate;
pub mod discovery;
pub mod identity;
pub mod service;
pub mod validator;

pub use action::{ActionDescriptor, Verdict};
pub use delegate::AuthorizationDelegate;
pub use identity::{Credential, Identity, RequestContext, extract_identity};
pub use service::{AuthGate, LoginInfo, TokenInfo};
pub use validator::{ProbeSelection, TokenValidator};
