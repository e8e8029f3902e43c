//! Credential extraction.
//!
//! A request context either carries a credential or it does not. Whether a
//! present credential is any good is decided later by the probe check; here
//! we only refuse requests that have nothing to present.

use std::fmt;

use crate::cluster::{ClusterClient, ClusterConnector};
use crate::{Error, Result};

/// Opaque bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Parse an `Authorization` header value (`Bearer <token>`, any case).
    ///
    /// Returns `None` for other schemes and for an empty token.
    #[must_use]
    pub fn from_authorization(header: &str) -> Option<Self> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then(|| Self::new(token))
    }

    /// The raw credential value
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Per-request context handed to the gate by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    credential: Option<Credential>,
    username: Option<String>,
    request_id: Option<String>,
}

impl RequestContext {
    /// Empty context (no credential)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a credential
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Attach a bearer token
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_credential(Credential::new(token))
    }

    /// Attach the caller-supplied username
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach a request id for log correlation
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Use `token` as the credential unless one is already present
    #[must_use]
    pub fn with_fallback_token(mut self, token: &str) -> Self {
        if self.credential.is_none() && !token.is_empty() {
            self.credential = Some(Credential::new(token));
        }
        self
    }

    /// The credential, if any
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The caller-supplied username, if any
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The request id, if any
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

/// Authenticated-client handle bound to a single request.
///
/// Holding an `Identity` says nothing about validity; it only means a
/// credential was presented.
pub struct Identity {
    credential: Credential,
    client: Box<dyn ClusterClient>,
}

impl Identity {
    /// Bind a credential to its cluster client
    #[must_use]
    pub fn new(credential: Credential, client: Box<dyn ClusterClient>) -> Self {
        Self { credential, client }
    }

    /// The presented credential
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Cluster queries on behalf of this identity
    #[must_use]
    pub fn client(&self) -> &dyn ClusterClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

/// Build an [`Identity`] from the request context.
///
/// Fails with [`Error::Unauthenticated`] when there is no context or no
/// credential in it.
pub fn extract_identity(
    ctx: Option<&RequestContext>,
    connector: &dyn ClusterConnector,
) -> Result<Identity> {
    let credential = ctx
        .and_then(RequestContext::credential)
        .ok_or(Error::Unauthenticated)?
        .clone();
    let client = connector.connect(&credential)?;
    Ok(Identity::new(credential, client))
}
