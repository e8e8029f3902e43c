//! The public gate operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ActionDescriptor, AuthorizationDelegate, ProbeSelection, RequestContext, TokenValidator,
    Verdict, extract_identity,
};
use crate::audit::{self, AuditEvent};
use crate::cluster::{ClusterConnector, RbacAuthority};
use crate::config::Config;
use crate::{Error, Result};

/// Result of a successful ValidateToken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Domain from the system configuration (empty when unset)
    pub domain: String,
    /// The caller's own credential, echoed back
    pub token: String,
    /// Caller-supplied username (empty when none was given)
    pub username: String,
}

/// Result of a successful LogIn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInfo {
    /// Always empty for LogIn
    pub domain: String,
    /// The validated credential
    pub token: String,
    /// The username supplied at log-in
    pub username: String,
}

/// Stateless token-validation and authorization gate.
///
/// Holds only read-only handles to the cluster collaborators; every call
/// builds its own identity and validates it from scratch.
#[derive(Clone)]
pub struct AuthGate {
    connector: Arc<dyn ClusterConnector>,
    delegate: AuthorizationDelegate,
    validator: TokenValidator,
    domain_key: String,
}

impl AuthGate {
    /// Create a gate over the given collaborators with default settings
    #[must_use]
    pub fn new(connector: Arc<dyn ClusterConnector>, authority: Arc<dyn RbacAuthority>) -> Self {
        let delegate = AuthorizationDelegate::new(authority);
        Self {
            connector,
            validator: TokenValidator::new(delegate.clone(), ProbeSelection::default()),
            delegate,
            domain_key: crate::config::ClusterConfig::default().domain_key,
        }
    }

    /// Create a gate configured from `config`
    #[must_use]
    pub fn with_config(
        connector: Arc<dyn ClusterConnector>,
        authority: Arc<dyn RbacAuthority>,
        config: &Config,
    ) -> Self {
        Self::new(connector, authority)
            .with_probe_selection(config.probe.selection)
            .with_domain_key(&config.cluster.domain_key)
    }

    /// Choose how the probe target is selected
    #[must_use]
    pub fn with_probe_selection(mut self, selection: ProbeSelection) -> Self {
        self.validator = TokenValidator::new(self.delegate.clone(), selection);
        self
    }

    /// Key of the domain entry in the system configuration
    #[must_use]
    pub fn with_domain_key(mut self, key: &str) -> Self {
        self.domain_key = key.to_string();
        self
    }

    /// May the caller perform `action`?
    ///
    /// The caller's credential is validated first; the requested action is
    /// only checked once the probe has succeeded.
    ///
    /// # Errors
    ///
    /// - validation errors unchanged ([`Error::Unauthenticated`],
    ///   [`Error::ConfigurationFault`], collaborator failures)
    /// - [`Error::PermissionDenied`] when the action is refused or the
    ///   authority fails while checking it
    pub async fn authorize_action(
        &self,
        ctx: Option<&RequestContext>,
        action: &ActionDescriptor,
    ) -> Result<Verdict> {
        let outcome = self.authorize_inner(ctx, action).await;
        match &outcome {
            Ok(_) => audit::emit(&AuditEvent::authorized(ctx, action)),
            Err(e) => audit::emit(&AuditEvent::failed("authorize_action", ctx, Some(action), e)),
        }
        outcome
    }

    async fn authorize_inner(
        &self,
        ctx: Option<&RequestContext>,
        action: &ActionDescriptor,
    ) -> Result<Verdict> {
        let identity = extract_identity(ctx, self.connector.as_ref())?;
        self.validator.validate(&identity).await?;

        match self.delegate.check_allowed(&identity, action).await {
            Ok(verdict) if verdict.allowed => Ok(verdict),
            Ok(_) => Err(Error::permission_denied(action, "denied by cluster RBAC")),
            Err(Error::Authorization { source, .. }) => {
                Err(Error::permission_denied(action, source.to_string()))
            }
            Err(e) => Err(Error::permission_denied(action, e.to_string())),
        }
    }

    /// Is the caller's credential valid? Returns the system domain and the
    /// credential itself.
    ///
    /// # Errors
    ///
    /// Validation errors unchanged; system configuration fetch failures are
    /// passed through as [`Error::Upstream`].
    pub async fn validate_token(&self, ctx: Option<&RequestContext>) -> Result<TokenInfo> {
        let outcome = self.validate_inner(ctx).await;
        emit_token_outcome("validate_token", ctx, &outcome);
        outcome
    }

    async fn validate_inner(&self, ctx: Option<&RequestContext>) -> Result<TokenInfo> {
        let identity = extract_identity(ctx, self.connector.as_ref())?;
        self.validator.validate(&identity).await?;

        let config = identity.client().system_config().await?;
        let domain = config.get(&self.domain_key).unwrap_or_default().to_string();
        if domain.is_empty() {
            debug!(key = %self.domain_key, "System configuration has no domain entry");
        }

        Ok(TokenInfo {
            domain,
            token: identity.credential().expose().to_string(),
            username: ctx
                .and_then(RequestContext::username)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Log in with a username and token hash.
    ///
    /// Behaves like [`validate_token`](Self::validate_token). The token hash
    /// is used as the credential unless the context already carries one; the
    /// domain is always returned empty.
    ///
    /// # Errors
    ///
    /// Same as [`validate_token`](Self::validate_token).
    pub async fn log_in(
        &self,
        ctx: Option<&RequestContext>,
        username: &str,
        token_hash: &str,
    ) -> Result<LoginInfo> {
        let outcome = match ctx {
            None => Err(Error::Unauthenticated),
            Some(ctx) => {
                let login_ctx = ctx
                    .clone()
                    .with_fallback_token(token_hash)
                    .with_username(username);
                self.validate_inner(Some(&login_ctx))
                    .await
                    .map(|info| LoginInfo {
                        domain: String::new(),
                        token: info.token,
                        username: info.username,
                    })
            }
        };
        emit_token_outcome("log_in", ctx, &outcome);
        outcome
    }
}

fn emit_token_outcome<T>(operation: &'static str, ctx: Option<&RequestContext>, outcome: &Result<T>) {
    match outcome {
        Ok(_) => audit::emit(&AuditEvent::token_validated(operation, ctx)),
        Err(e) => audit::emit(&AuditEvent::failed(operation, ctx, None, e)),
    }
}
