use std::fmt;

/// Reason strings used by [`AuthError::Rejected`]. Kept as named constants,
/// mirroring the teacher's `error!` table, even though the variant itself
/// carries an owned `String` rather than a `&'static` one.
pub mod reason {
    pub const CLIENT_IDS_DO_NOT_MATCH: &str = "ClientIds do not match";
    pub const EMPTY_CLIENT_ID: &str = "client_id must not be empty";
    pub const CRYPTO_FAILURE: &str = "decryption failed";
    pub const NOT_ADMIN: &str = "caller is not an administrator";
    pub const SELF_TARGET: &str = "operation may not target the caller's own principal";
    pub const ALREADY_EXISTS: &str = "principal already exists";
    pub const STALE_CREDENTIALS: &str = "old credentials do not match stored value";
    pub const NOT_SERVICE_SERVER: &str = "caller is not the service server principal";
    pub const BOOTSTRAP_UNAVAILABLE: &str = "bootstrap is not available";
    pub const MALFORMED_KEY: &str = "stored key material has the wrong length";
}

/// The tagged error set the core produces, per the propagation policy in
/// the specification's error handling design: handler functions return this
/// type directly, and the controller is the only place it gets translated
/// for a remote caller.
#[derive(Debug)]
pub enum AuthError {
    /// Principal absent from the credential store.
    NotAvailable(String),
    /// Authenticator/ticket mismatch, unknown user part, failed crypto, or
    /// an administrative precondition violation. Reason strings never
    /// distinguish crypto-oracle signals from structural failures.
    Rejected(String),
    /// Authenticator timestamp outside ticket validity or outside the
    /// server clock-skew window.
    SessionExpired,
    /// Authorization check failed. Logged distinctly from `Rejected` but
    /// surfaced to remote callers as `Rejected`.
    PermissionDenied(String),
    /// Impossible algorithm/provider state. Fatal; logged with its cause,
    /// never leaked to the caller.
    CryptoFault(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAvailable(id) => write!(f, "principal not available: {id}"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
            Self::SessionExpired => write!(f, "session expired"),
            Self::PermissionDenied(reason) => write!(f, "permission denied: {reason}"),
            Self::CryptoFault(detail) => write!(f, "crypto fault: {detail}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied(reason.into())
    }

    pub fn crypto_fault(detail: impl Into<String>) -> Self {
        Self::CryptoFault(detail.into())
    }

    /// Collapses any handler-level error into the remote-callable surface's
    /// error set: `PermissionDenied` and `CryptoFault` are never surfaced
    /// verbatim to a caller (spec §7).
    pub fn into_remote(self) -> Self {
        match self {
            Self::PermissionDenied(reason) => {
                tracing::warn!(reason, "permission denied");
                Self::Rejected(reason::NOT_ADMIN.to_owned())
            }
            Self::CryptoFault(detail) => {
                tracing::error!(detail, "crypto fault");
                Self::Rejected(reason::CRYPTO_FAILURE.to_owned())
            }
            other => other,
        }
    }
}
