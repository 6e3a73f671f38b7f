//! Protocol Messages: the tagged record definitions the handler and
//! controller exchange. Every record here is `Serialize`/`Deserialize` so a
//! transport layer (out of scope for this crate) can frame it directly;
//! sealed fields (`ticket`, `authenticator`, `session_key` on the wrapper
//! types) are opaque ciphertext byte strings, never structured here.

use serde::{Deserialize, Serialize};

use crate::error::{reason, AuthError};

/// A half-open-by-convention `[begin_ns, end_ns]` validity window, in
/// nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub begin_ns: i64,
    pub end_ns: i64,
}

impl Interval {
    pub fn new(begin_ns: i64, end_ns: i64) -> Self {
        Self { begin_ns, end_ns }
    }

    pub fn contains(&self, timestamp_ns: i64) -> bool {
        timestamp_ns >= self.begin_ns && timestamp_ns <= self.end_ns
    }
}

/// Immutable once sealed; renewal produces a new `Ticket`, never a mutation
/// of an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub client_id: String,
    pub client_ip: String,
    pub validity_period: Interval,
    pub session_key: Vec<u8>,
}

impl Ticket {
    /// `client_id` must be non-empty; this is enforced here rather than
    /// left to callers, since every Ticket this crate issues is sealed
    /// immediately after construction.
    pub fn new(
        client_id: impl Into<String>,
        client_ip: impl Into<String>,
        validity_period: Interval,
        session_key: Vec<u8>,
    ) -> Result<Self, AuthError> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(AuthError::rejected(reason::EMPTY_CLIENT_ID));
        }
        Ok(Self {
            client_id,
            client_ip: client_ip.into(),
            validity_period,
            session_key,
        })
    }
}

/// Freshly minted per request by clients; the server returns it with
/// `timestamp_ns + 1` to prove liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    pub client_id: String,
    pub timestamp_ns: i64,
}

/// `ticket` sealed under a long-lived server secret; `authenticator` sealed
/// under the ticket's session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketAuthenticatorWrapper {
    pub ticket: Vec<u8>,
    pub authenticator: Vec<u8>,
}

/// `ticket` sealed under a long-lived server secret; `session_key` is the
/// wrapped session key for the caller (symmetric-wrapped, asymmetric-wrapped,
/// or both in sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSessionKeyWrapper {
    pub ticket: Vec<u8>,
    pub session_key: Vec<u8>,
}

/// The sealed wrapper plus an opaque sealed payload, returned by
/// `request_service_server_secret_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedValue {
    pub wrapper: TicketAuthenticatorWrapper,
    pub value: Vec<u8>,
}

/// The request body for every administrative operation
/// (`change_credentials`, `register`, `remove_user`, `set_administrator`).
/// Not every field is consumed by every operation: `remove_user` and
/// `set_administrator` ignore `old_credentials`/`new_credentials`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentialsChange {
    pub id: String,
    pub wrapper: TicketAuthenticatorWrapper,
    #[serde(default)]
    pub old_credentials: Vec<u8>,
    #[serde(default)]
    pub new_credentials: Vec<u8>,
    #[serde(default)]
    pub admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_rejects_empty_client_id() {
        let err = Ticket::new("", "", Interval::new(0, 1), vec![0; 16]).unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[test]
    fn interval_contains_is_inclusive() {
        let interval = Interval::new(10, 20);
        assert!(interval.contains(10));
        assert!(interval.contains(20));
        assert!(!interval.contains(9));
        assert!(!interval.contains(21));
    }
}
