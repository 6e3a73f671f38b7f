//! Authentication Handler: pure functions implementing KDC, TGS, and
//! Service-Server request handling, plus ticket validation. Every function
//! here is stateless and thread-safe by construction — secrets are always
//! passed in as parameters, never read from shared mutable state.

use chrono::Utc;

use crate::crypto::{self, WrappingKey};
use crate::error::{reason, AuthError};
use crate::message::{
    Authenticator, Interval, Ticket, TicketAuthenticatorWrapper, TicketSessionKeyWrapper,
};

/// The server's clock-skew tolerance: an authenticator timestamp outside
/// this window of the server's wall clock is rejected as expired. This
/// bound is fixed, not configurable — it is a protocol invariant, not a
/// deployment tunable.
pub const CLOCK_SKEW_NS: i64 = 2 * 60 * 1_000_000_000;

pub fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// Either half of a principal's stored key material, as resolved by the
/// controller from the credential store before calling into this module.
pub enum ClientKey<'a> {
    None,
    Public(&'a rsa::RsaPublicKey),
}

/// KDC request handling (spec step 1 of the protocol): issues a fresh TGT
/// wrapped for the caller.
///
/// `user_key`, when present, is the caller's password-derived symmetric
/// key; `client_key`, when present, is the caller's registered RSA public
/// key. At least one must be supplied by the caller (the controller
/// surfaces `NotAvailable` itself when neither principal half resolves in
/// the store).
pub fn handle_kdc_request(
    id: &str,
    user_key: Option<&[u8; 16]>,
    client_key: ClientKey,
    client_ip: &str,
    tgs_secret_key: &[u8; 16],
    validity_ns: i64,
) -> Result<TicketSessionKeyWrapper, AuthError> {
    let tgs_session_key = crypto::generate_key();

    let now = now_ns();
    let ticket = Ticket::new(
        id,
        client_ip,
        Interval::new(now, now + validity_ns),
        tgs_session_key.to_vec(),
    )?;
    let sealed_ticket = crypto::encrypt_symmetric(&ticket, tgs_secret_key)?;

    // The order matters: user wrap first, then client wrap over the
    // (possibly already wrapped) bytes. Clients must unwrap in the reverse
    // order.
    let mut wrapped_key = tgs_session_key.to_vec();
    if let Some(user_key) = user_key {
        wrapped_key = crypto::wrap_session_key(&wrapped_key, &WrappingKey::Symmetric(user_key))?;
    }
    if let ClientKey::Public(public_key) = client_key {
        wrapped_key = crypto::wrap_session_key(&wrapped_key, &WrappingKey::Asymmetric(public_key))?;
    }

    Ok(TicketSessionKeyWrapper {
        ticket: sealed_ticket,
        session_key: wrapped_key,
    })
}

/// Decrypts and validates a TGT/authenticator pair under `tgs_secret_key`,
/// without renewing anything. Shared by [`handle_tgs_request`] and by the
/// controller wherever it needs the TGT's session key or client id after
/// validation.
pub fn open_tgt(
    tgs_secret_key: &[u8; 16],
    wrapper: &TicketAuthenticatorWrapper,
) -> Result<(Ticket, Authenticator, [u8; 16]), AuthError> {
    let tgt: Ticket = crypto::decrypt_symmetric(&wrapper.ticket, tgs_secret_key)?;
    let tgt_session_key = session_key_array(&tgt.session_key)?;
    let authenticator: Authenticator =
        crypto::decrypt_symmetric(&wrapper.authenticator, &tgt_session_key)?;
    validate_ticket(&tgt, &authenticator)?;
    Ok((tgt, authenticator, tgt_session_key))
}

/// Decrypts and validates a CST/authenticator pair under `ss_secret_key`,
/// without renewing anything. Shared by [`handle_ss_request`] and by the
/// controller's administrative operations, which all run this same
/// validation before mutating the store.
pub fn open_cst(
    ss_secret_key: &[u8; 16],
    wrapper: &TicketAuthenticatorWrapper,
) -> Result<(Ticket, Authenticator, [u8; 16]), AuthError> {
    let cst: Ticket = crypto::decrypt_symmetric(&wrapper.ticket, ss_secret_key)?;
    let cst_session_key = session_key_array(&cst.session_key)?;
    let authenticator: Authenticator =
        crypto::decrypt_symmetric(&wrapper.authenticator, &cst_session_key)?;
    validate_ticket(&cst, &authenticator)?;
    Ok((cst, authenticator, cst_session_key))
}

/// TGS request handling: exchanges a TGT for a CST.
pub fn handle_tgs_request(
    tgs_secret_key: &[u8; 16],
    ss_secret_key: &[u8; 16],
    wrapper: &TicketAuthenticatorWrapper,
    validity_ns: i64,
) -> Result<TicketSessionKeyWrapper, AuthError> {
    let (tgt, _authenticator, tgt_session_key) = open_tgt(tgs_secret_key, wrapper)?;

    let ss_session_key = crypto::generate_key();
    let now = now_ns();
    let cst = Ticket::new(
        tgt.client_id,
        tgt.client_ip,
        Interval::new(now, now + validity_ns),
        ss_session_key.to_vec(),
    )?;
    let sealed_cst = crypto::encrypt_symmetric(&cst, ss_secret_key)?;
    let wrapped_session_key =
        crypto::symmetric::encrypt_bytes(&ss_session_key, &tgt_session_key)?;

    Ok(TicketSessionKeyWrapper {
        ticket: sealed_cst,
        session_key: wrapped_session_key,
    })
}

/// Service-Server request handling: validates a CST and renews it.
pub fn handle_ss_request(
    ss_secret_key: &[u8; 16],
    wrapper: &TicketAuthenticatorWrapper,
    validity_ns: i64,
) -> Result<TicketAuthenticatorWrapper, AuthError> {
    let (cst, authenticator, cst_session_key) = open_cst(ss_secret_key, wrapper)?;
    renew_cst(ss_secret_key, cst, cst_session_key, authenticator, validity_ns)
}

/// Builds a renewed CST/authenticator pair from an already-opened and
/// validated CST, without re-decrypting it. Shared by [`handle_ss_request`]
/// and by the controller's administrative operations, which all run SS
/// validation once and then need the same renewed wrapper back (spec.md
/// §4.4: every admin endpoint "run[s] the SS validation first" and returns
/// the validated wrapper).
pub fn renew_cst(
    ss_secret_key: &[u8; 16],
    ticket: Ticket,
    session_key: [u8; 16],
    authenticator: Authenticator,
    validity_ns: i64,
) -> Result<TicketAuthenticatorWrapper, AuthError> {
    let now = now_ns();
    let renewed = Ticket::new(
        ticket.client_id,
        ticket.client_ip,
        Interval::new(now, now + validity_ns),
        ticket.session_key,
    )?;
    let renewed_authenticator = Authenticator {
        client_id: authenticator.client_id,
        timestamp_ns: authenticator.timestamp_ns + 1,
    };

    let sealed_ticket = crypto::encrypt_symmetric(&renewed, ss_secret_key)?;
    let sealed_authenticator =
        crypto::encrypt_symmetric(&renewed_authenticator, &session_key)?;

    Ok(TicketAuthenticatorWrapper {
        ticket: sealed_ticket,
        authenticator: sealed_authenticator,
    })
}

/// Validates a ticket/authenticator pair. Fails `Rejected` on a `client_id`
/// mismatch or an empty `client_id`; fails `SessionExpired` if the
/// authenticator's timestamp falls outside the ticket's validity window or
/// outside the server clock-skew bound.
pub fn validate_ticket(ticket: &Ticket, authenticator: &Authenticator) -> Result<(), AuthError> {
    if ticket.client_id.is_empty() || authenticator.client_id.is_empty() {
        return Err(AuthError::rejected(reason::EMPTY_CLIENT_ID));
    }
    if ticket.client_id != authenticator.client_id {
        return Err(AuthError::rejected(reason::CLIENT_IDS_DO_NOT_MATCH));
    }

    let now = now_ns();
    let within_skew = authenticator.timestamp_ns >= now - CLOCK_SKEW_NS
        && authenticator.timestamp_ns <= now + CLOCK_SKEW_NS;
    if !ticket.validity_period.contains(authenticator.timestamp_ns) || !within_skew {
        return Err(AuthError::SessionExpired);
    }

    Ok(())
}

fn session_key_array(bytes: &[u8]) -> Result<[u8; 16], AuthError> {
    bytes
        .try_into()
        .map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TGS_KEY: [u8; 16] = [1u8; 16];
    const SS_KEY: [u8; 16] = [2u8; 16];
    const USER_KEY: [u8; 16] = [3u8; 16];

    fn issue_tgt(client_id: &str) -> TicketSessionKeyWrapper {
        handle_kdc_request(
            client_id,
            Some(&USER_KEY),
            ClientKey::None,
            "",
            &TGS_KEY,
            60_000_000_000,
        )
        .unwrap()
    }

    fn authenticator_wrapper_for(
        tgt: &TicketSessionKeyWrapper,
        client_id: &str,
        timestamp_ns: i64,
    ) -> TicketAuthenticatorWrapper {
        let session_key = crypto::symmetric::decrypt_bytes(&tgt.session_key, &USER_KEY).unwrap();
        let session_key: [u8; 16] = session_key.try_into().unwrap();
        let authenticator = Authenticator {
            client_id: client_id.to_owned(),
            timestamp_ns,
        };
        let sealed_authenticator =
            crypto::encrypt_symmetric(&authenticator, &session_key).unwrap();
        TicketAuthenticatorWrapper {
            ticket: tgt.ticket.clone(),
            authenticator: sealed_authenticator,
        }
    }

    #[test]
    fn kdc_round_trip_s1() {
        let wrapper = issue_tgt("alice@");
        let unwrapped_session_key =
            crypto::symmetric::decrypt_bytes(&wrapper.session_key, &USER_KEY).unwrap();
        let ticket: Ticket = crypto::decrypt_symmetric(&wrapper.ticket, &TGS_KEY).unwrap();
        assert_eq!(unwrapped_session_key, ticket.session_key);
        assert_eq!(unwrapped_session_key.len(), 16);
    }

    #[test]
    fn tgs_then_ss_round_trip() {
        let tgt = issue_tgt("alice@");
        let now = now_ns();
        let tgs_wrapper = authenticator_wrapper_for(&tgt, "alice@", now);

        let cst = handle_tgs_request(&TGS_KEY, &SS_KEY, &tgs_wrapper, 60_000_000_000).unwrap();

        let cst_session_key =
            crypto::symmetric::decrypt_bytes(&cst.session_key, &{
                let session_key =
                    crypto::symmetric::decrypt_bytes(&tgt.session_key, &USER_KEY).unwrap();
                let arr: [u8; 16] = session_key.try_into().unwrap();
                arr
            })
            .unwrap();
        let cst_session_key: [u8; 16] = cst_session_key.try_into().unwrap();

        let ss_authenticator = Authenticator {
            client_id: "alice@".to_owned(),
            timestamp_ns: now,
        };
        let sealed_authenticator =
            crypto::encrypt_symmetric(&ss_authenticator, &cst_session_key).unwrap();
        let ss_wrapper = TicketAuthenticatorWrapper {
            ticket: cst.ticket.clone(),
            authenticator: sealed_authenticator,
        };

        let renewed = handle_ss_request(&SS_KEY, &ss_wrapper, 60_000_000_000).unwrap();
        let renewed_authenticator: Authenticator =
            crypto::decrypt_symmetric(&renewed.authenticator, &cst_session_key).unwrap();
        assert_eq!(renewed_authenticator.timestamp_ns, now + 1);

        let original_cst: Ticket = crypto::decrypt_symmetric(&cst.ticket, &SS_KEY).unwrap();
        let renewed_cst: Ticket = crypto::decrypt_symmetric(&renewed.ticket, &SS_KEY).unwrap();
        assert_eq!(original_cst.client_id, renewed_cst.client_id);
        assert_eq!(original_cst.session_key, renewed_cst.session_key);
    }

    #[test]
    fn clock_skew_beyond_bound_expires_s2() {
        let tgt = issue_tgt("alice@");
        let future = now_ns() + CLOCK_SKEW_NS + 60_000_000_000;
        let wrapper = authenticator_wrapper_for(&tgt, "alice@", future);
        let err = handle_tgs_request(&TGS_KEY, &SS_KEY, &wrapper, 60_000_000_000).unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
    }

    #[test]
    fn mismatched_client_id_is_rejected_s3() {
        let tgt = issue_tgt("alice@");
        let wrapper = authenticator_wrapper_for(&tgt, "bob@", now_ns());
        let err = handle_tgs_request(&TGS_KEY, &SS_KEY, &wrapper, 60_000_000_000).unwrap_err();
        match err {
            AuthError::Rejected(reason) => assert_eq!(reason, crate::error::reason::CLIENT_IDS_DO_NOT_MATCH),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn validate_ticket_accepts_within_bounds() {
        let now = now_ns();
        let ticket = Ticket::new(
            "alice@",
            "",
            Interval::new(now - 1_000_000_000, now + 1_000_000_000),
            vec![0; 16],
        )
        .unwrap();
        let authenticator = Authenticator {
            client_id: "alice@".to_owned(),
            timestamp_ns: now,
        };
        assert!(validate_ticket(&ticket, &authenticator).is_ok());
    }

    #[test]
    fn validate_ticket_rejects_outside_ticket_validity() {
        let now = now_ns();
        let ticket = Ticket::new(
            "alice@",
            "",
            Interval::new(now - 1_000_000_000, now - 500_000_000),
            vec![0; 16],
        )
        .unwrap();
        let authenticator = Authenticator {
            client_id: "alice@".to_owned(),
            timestamp_ns: now,
        };
        let err = validate_ticket(&ticket, &authenticator).unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
    }
}
