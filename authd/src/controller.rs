//! Authenticator Controller: the stateful façade wiring the credential
//! store, the long-lived secret keys, and the pure handler functions. This
//! is the only place secrets live as instance fields, the only place store
//! access is serialized, and the only place authorization on administrative
//! mutations is enforced.
//!
//! Every public operation below runs its crypto- and store-bound work
//! inside [`tokio::task::spawn_blocking`]: AES/RSA are CPU-bound and
//! non-yielding, and the store's save path is blocking file I/O (spec §5),
//! so neither belongs inline on the async reactor thread.

use std::fs;
use std::sync::Arc;

use rand::distributions::{Alphanumeric, DistString};
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::{self, asymmetric};
use crate::error::{reason, AuthError};
use crate::handler::{self, ClientKey};
use crate::message::{
    AuthenticatedValue, LoginCredentialsChange, TicketAuthenticatorWrapper,
    TicketSessionKeyWrapper,
};
use crate::principal::{Principal, SERVICE_SERVER_ID};
use crate::store::{Store, SERVICE_SERVER_SECRET_KEY, TICKET_GRANTING_KEY};

const PRIVATE_KEY_FILE_NAME: &str = "service_server_private_key";
const INITIAL_PASSWORD_LEN: usize = 15;

/// The controller's lifecycle. Transitions trigger store load (on init),
/// private-key file write (on first activation when the store lacks
/// `SERVICE_SERVER_ID`), and initial-password generation when bootstrap is
/// still required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initialized,
    Active,
    Inactive,
}

/// Builds the credential-store id a pure-user principal is keyed under:
/// the same `user@` shape [`Principal::unparse`] produces for an empty
/// client half. Administrative operations address principals by bare
/// username (spec.md §4.4, §8 S4/S5); this is the one place that convention
/// is translated into a store lookup key.
fn user_store_id(user: &str) -> String {
    Principal {
        user: user.to_owned(),
        client: String::new(),
    }
    .unparse()
}

fn service_server_store_id() -> String {
    Principal {
        user: String::new(),
        client: SERVICE_SERVER_ID.to_owned(),
    }
    .unparse()
}

pub struct Controller {
    store: Arc<Store>,
    settings: Settings,
    tgs_secret_key: [u8; 16],
    ss_secret_key: [u8; 16],
    state: RwLock<ControllerState>,
    /// Held only in process memory, per spec.md §3's lifecycle note; cleared
    /// the moment the first user registers. `None` both before activation
    /// and after the store has been bootstrapped.
    initial_password: AsyncMutex<Option<Zeroizing<String>>>,
}

impl Controller {
    /// Loads or creates the credential store at `settings.credentials_dir`,
    /// generating and persisting the `TICKET_GRANTING_KEY` and
    /// `SERVICE_SERVER_SECRET_KEY` bootstrap entries if either is missing.
    /// Leaves the controller in `Initialized` state; call [`Self::activate`]
    /// to complete the service-server identity bootstrap and initial
    /// password generation.
    pub async fn init(settings: Settings) -> Result<Self, AuthError> {
        fs::create_dir_all(&settings.credentials_dir).map_err(|e| {
            AuthError::crypto_fault(format!("failed to create credentials dir: {e}"))
        })?;
        let store_path = settings.credentials_dir.join(crate::store::STORE_FILE_NAME);

        let (store, tgs_secret_key, ss_secret_key) = Self::blocking(move || {
            let store = Store::init(store_path)?;
            let tgs_secret_key = Self::ensure_bootstrap_key(&store, TICKET_GRANTING_KEY)?;
            let ss_secret_key = Self::ensure_bootstrap_key(&store, SERVICE_SERVER_SECRET_KEY)?;
            Ok((store, tgs_secret_key, ss_secret_key))
        })
        .await?;

        Ok(Self {
            store: Arc::new(store),
            settings,
            tgs_secret_key,
            ss_secret_key,
            state: RwLock::new(ControllerState::Initialized),
            initial_password: AsyncMutex::new(None),
        })
    }

    fn ensure_bootstrap_key(store: &Store, id: &str) -> Result<[u8; 16], AuthError> {
        if !store.has_entry(id) {
            let key = crypto::generate_key();
            store.add_credentials(id, key.to_vec(), false)?;
        }
        store
            .get_credentials(id)?
            .try_into()
            .map_err(|_| AuthError::crypto_fault(format!("{id} has the wrong key length")))
    }

    /// Completes activation: writes the service-server RSA private key file
    /// and the public-key store entry if they don't already exist, and
    /// generates the one-time initial password if the store has never been
    /// bootstrapped. Returns the password exactly once, for the caller (the
    /// bootstrap binary, per spec.md §6) to print to stdout.
    pub async fn activate(&self) -> Result<Option<Zeroizing<String>>, AuthError> {
        let service_server_id = service_server_store_id();
        if !self.store.has_entry(&service_server_id) {
            let store = Arc::clone(&self.store);
            let key_path = self.settings.credentials_dir.join(PRIVATE_KEY_FILE_NAME);
            Self::blocking(move || {
                let (public_der, private_der) = asymmetric::generate_key_pair()?;
                write_private_key_file(&key_path, &private_der)?;
                store.add_credentials(&service_server_id, public_der, false)
            })
            .await?;
        }

        let mut guard = self.initial_password.lock().await;
        let password = if !self.store.is_bootstrapped() && guard.is_none() {
            let generated = Zeroizing::new(Alphanumeric.sample_string(
                &mut rand::thread_rng(),
                INITIAL_PASSWORD_LEN,
            ));
            *guard = Some(generated.clone());
            Some(generated)
        } else {
            None
        };
        drop(guard);

        *self.state.write().await = ControllerState::Active;
        Ok(password)
    }

    pub async fn shutdown(&self) -> Result<(), AuthError> {
        *self.state.write().await = ControllerState::Inactive;
        self.store.shutdown()
    }

    pub async fn state(&self) -> ControllerState {
        *self.state.read().await
    }

    /// `true` for as long as the store has never completed a bootstrap
    /// `register`. Supersedes the legacy "store size == 3" heuristic
    /// spec.md §9 flags as brittle: this reads the store's own persisted
    /// `bootstrapped` flag instead of counting entries.
    pub fn initial_password_required(&self) -> bool {
        !self.store.is_bootstrapped()
    }

    /// The live initial password, if bootstrap is still pending and
    /// [`Self::activate`] has generated one. `None` once the first user has
    /// registered (spec.md §8 invariant 5).
    pub async fn get_initial_password(&self) -> Option<Zeroizing<String>> {
        self.initial_password.lock().await.clone()
    }

    async fn blocking<T: Send + 'static>(
        f: impl FnOnce() -> Result<T, AuthError> + Send + 'static,
    ) -> Result<T, AuthError> {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| AuthError::crypto_fault(format!("worker task panicked: {e}")))?
    }

    /// KDC request handling. Splits `id` on `@`, resolves whichever halves
    /// are registered, and issues a TGT wrapped for the caller. Returns
    /// `NotAvailable` if neither half resolves.
    ///
    /// This is the remote-callable `requestTicketGrantingTicket` operation
    /// (spec.md §6): the result is translated through [`AuthError::into_remote`]
    /// before it reaches the caller, since this method's `&self` boundary is
    /// the only translation point this crate has (the RPC transport that
    /// would otherwise do it is out of scope).
    pub async fn request_ticket_granting_ticket(
        &self,
        id: &str,
    ) -> Result<TicketSessionKeyWrapper, AuthError> {
        self.request_ticket_granting_ticket_impl(id)
            .await
            .map_err(AuthError::into_remote)
    }

    async fn request_ticket_granting_ticket_impl(
        &self,
        id: &str,
    ) -> Result<TicketSessionKeyWrapper, AuthError> {
        let principal = Principal::parse(id);
        let user_key: Option<[u8; 16]> = if principal.is_user() {
            self.store
                .get_credentials(&user_store_id(&principal.user))
                .ok()
                .map(|bytes| bytes.try_into())
                .transpose()
                .map_err(|_| AuthError::rejected(reason::MALFORMED_KEY))?
        } else {
            None
        };
        let client_public_der: Option<Vec<u8>> = if principal.is_client() {
            let store_id = Principal {
                user: String::new(),
                client: principal.client.clone(),
            }
            .unparse();
            self.store.get_credentials(&store_id).ok()
        } else {
            None
        };

        if user_key.is_none() && client_public_der.is_none() {
            return Err(AuthError::NotAvailable(id.to_owned()));
        }

        let tgs_key = self.tgs_secret_key;
        let validity = self.settings.tgt_validity_ns;
        let id = id.to_owned();
        Self::blocking(move || {
            let client_public_key = client_public_der
                .as_deref()
                .map(asymmetric::decode_public_key)
                .transpose()?;
            let client_key = match &client_public_key {
                Some(key) => ClientKey::Public(key),
                None => ClientKey::None,
            };
            handler::handle_kdc_request(&id, user_key.as_ref(), client_key, "", &tgs_key, validity)
        })
        .await
    }

    /// TGS request handling: exchanges a TGT for a CST. Remote-callable
    /// `requestClientServerTicket` (spec.md §6); result translated through
    /// [`AuthError::into_remote`] at this boundary.
    pub async fn request_client_server_ticket(
        &self,
        wrapper: TicketAuthenticatorWrapper,
    ) -> Result<TicketSessionKeyWrapper, AuthError> {
        let tgs_key = self.tgs_secret_key;
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || handler::handle_tgs_request(&tgs_key, &ss_key, &wrapper, validity))
            .await
            .map_err(AuthError::into_remote)
    }

    /// Service-Server request handling: validates a CST and renews it.
    /// Remote-callable `validateClientServerTicket` (spec.md §6); result
    /// translated through [`AuthError::into_remote`] at this boundary.
    pub async fn validate_client_server_ticket(
        &self,
        wrapper: TicketAuthenticatorWrapper,
    ) -> Result<TicketAuthenticatorWrapper, AuthError> {
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || handler::handle_ss_request(&ss_key, &wrapper, validity))
            .await
            .map_err(AuthError::into_remote)
    }

    /// Validates the embedded wrapper, then authorizes and applies a
    /// credential change: the caller must either be the target principal or
    /// an administrator, and `change.old_credentials` must decrypt to
    /// exactly the value currently on file. Remote-callable
    /// `changeCredentials` (spec.md §6); result translated through
    /// [`AuthError::into_remote`] at this boundary.
    pub async fn change_credentials(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<TicketAuthenticatorWrapper, AuthError> {
        self.change_credentials_impl(change)
            .await
            .map_err(AuthError::into_remote)
    }

    async fn change_credentials_impl(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<TicketAuthenticatorWrapper, AuthError> {
        let store = Arc::clone(&self.store);
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || {
            let (cst, authenticator, cst_session_key) = handler::open_cst(&ss_key, &change.wrapper)?;
            let caller = Principal::parse(&authenticator.client_id);

            let authorized =
                caller.user == change.id || store.is_admin(&user_store_id(&caller.user));
            if !authorized {
                return Err(AuthError::permission_denied(reason::NOT_ADMIN));
            }

            let old_plain = crypto::symmetric::decrypt_bytes(&change.old_credentials, &cst_session_key)
                .map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))?;
            let target_store_id = user_store_id(&change.id);
            let stored = store.get_credentials(&target_store_id)?;
            if old_plain != stored {
                return Err(AuthError::rejected(reason::STALE_CREDENTIALS));
            }

            let new_plain = crypto::symmetric::decrypt_bytes(&change.new_credentials, &cst_session_key)
                .map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))?;
            store.set_credentials(&target_store_id, new_plain)?;

            handler::renew_cst(&ss_key, cst, cst_session_key, authenticator, validity)
        })
        .await
    }

    /// Registers a new principal. In bootstrap mode (store never
    /// registered, initial password still live) no authenticator is
    /// required and `None` is returned. Otherwise runs SS validation first
    /// and returns the renewed wrapper. Remote-callable `register`
    /// (spec.md §6); result translated through [`AuthError::into_remote`]
    /// at this boundary.
    pub async fn register(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<Option<TicketAuthenticatorWrapper>, AuthError> {
        let result = if self.initial_password_required() {
            self.register_bootstrap(change).await
        } else {
            self.register_normal(change).await.map(Some)
        };
        result.map_err(AuthError::into_remote)
    }

    async fn register_bootstrap(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<Option<TicketAuthenticatorWrapper>, AuthError> {
        let mut guard = self.initial_password.lock().await;
        let password = guard
            .clone()
            .ok_or_else(|| AuthError::rejected(reason::BOOTSTRAP_UNAVAILABLE))?;

        let store = Arc::clone(&self.store);
        let LoginCredentialsChange {
            id, new_credentials, ..
        } = change;
        Self::blocking(move || {
            let key = crypto::hash(&password);
            let plain = crypto::symmetric::decrypt_bytes(&new_credentials, &key)
                .map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))?;
            // Bootstrap always creates the first principal as an admin
            // (spec.md §4.4), regardless of `change.admin`.
            store.add_credentials(&user_store_id(&id), plain, true)?;
            store.mark_bootstrapped()
        })
        .await?;

        *guard = None;
        Ok(None)
    }

    async fn register_normal(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<TicketAuthenticatorWrapper, AuthError> {
        let store = Arc::clone(&self.store);
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || {
            let (cst, authenticator, cst_session_key) = handler::open_cst(&ss_key, &change.wrapper)?;
            let caller = Principal::parse(&authenticator.client_id);

            if change.admin && !store.is_admin(&user_store_id(&caller.user)) {
                return Err(AuthError::permission_denied(reason::NOT_ADMIN));
            }
            if change.id == caller.user {
                return Err(AuthError::rejected(reason::SELF_TARGET));
            }
            let target_store_id = user_store_id(&change.id);
            if store.has_entry(&target_store_id) {
                return Err(AuthError::rejected(reason::ALREADY_EXISTS));
            }

            let plain = crypto::symmetric::decrypt_bytes(&change.new_credentials, &cst_session_key)
                .map_err(|_| AuthError::rejected(reason::CRYPTO_FAILURE))?;
            store.add_credentials(&target_store_id, plain, change.admin)?;

            handler::renew_cst(&ss_key, cst, cst_session_key, authenticator, validity)
        })
        .await
    }

    /// Removes a principal. Refuses self-removal and absent targets.
    /// Remote-callable `removeUser` (spec.md §6); result translated through
    /// [`AuthError::into_remote`] at this boundary.
    pub async fn remove_user(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<TicketAuthenticatorWrapper, AuthError> {
        let store = Arc::clone(&self.store);
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || {
            let (cst, authenticator, cst_session_key) = handler::open_cst(&ss_key, &change.wrapper)?;
            let caller = Principal::parse(&authenticator.client_id);

            if !store.is_admin(&user_store_id(&caller.user)) {
                return Err(AuthError::permission_denied(reason::NOT_ADMIN));
            }
            if change.id == caller.user {
                return Err(AuthError::rejected(reason::SELF_TARGET));
            }
            store.remove_entry(&user_store_id(&change.id))?;

            handler::renew_cst(&ss_key, cst, cst_session_key, authenticator, validity)
        })
        .await
        .map_err(AuthError::into_remote)
    }

    /// Promotes or demotes a principal's administrator flag. Refuses
    /// self-targeting and absent targets. Remote-callable `setAdministrator`
    /// (spec.md §6); result translated through [`AuthError::into_remote`]
    /// at this boundary.
    pub async fn set_administrator(
        &self,
        change: LoginCredentialsChange,
    ) -> Result<TicketAuthenticatorWrapper, AuthError> {
        let store = Arc::clone(&self.store);
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || {
            let (cst, authenticator, cst_session_key) = handler::open_cst(&ss_key, &change.wrapper)?;
            let caller = Principal::parse(&authenticator.client_id);

            if !store.is_admin(&user_store_id(&caller.user)) {
                return Err(AuthError::permission_denied(reason::NOT_ADMIN));
            }
            if change.id == caller.user {
                return Err(AuthError::rejected(reason::SELF_TARGET));
            }
            store.set_admin(&user_store_id(&change.id), change.admin)?;

            handler::renew_cst(&ss_key, cst, cst_session_key, authenticator, validity)
        })
        .await
        .map_err(AuthError::into_remote)
    }

    /// Releases the service-server secret key, encrypted under the CST
    /// session key, to the `@SERVICE_SERVER_ID` principal only.
    /// Remote-callable `requestServiceServerSecretKey` (spec.md §6); result
    /// translated through [`AuthError::into_remote`] at this boundary.
    pub async fn request_service_server_secret_key(
        &self,
        wrapper: TicketAuthenticatorWrapper,
    ) -> Result<AuthenticatedValue, AuthError> {
        let ss_key = self.ss_secret_key;
        let validity = self.settings.cst_validity_ns;
        Self::blocking(move || {
            let (cst, authenticator, cst_session_key) = handler::open_cst(&ss_key, &wrapper)?;
            if authenticator.client_id != service_server_store_id() {
                return Err(AuthError::rejected(reason::NOT_SERVICE_SERVER));
            }
            let sealed_value = crypto::symmetric::encrypt_bytes(&ss_key, &cst_session_key)?;
            let renewed = handler::renew_cst(&ss_key, cst, cst_session_key, authenticator, validity)?;
            Ok(AuthenticatedValue {
                wrapper: renewed,
                value: sealed_value,
            })
        })
        .await
        .map_err(AuthError::into_remote)
    }

    pub async fn is_admin(&self, id: &str) -> bool {
        let store = Arc::clone(&self.store);
        let id = id.to_owned();
        Self::blocking(move || Ok(store.is_admin(&id)))
            .await
            .unwrap_or(false)
    }

    pub async fn has_user(&self, id: &str) -> bool {
        let store = Arc::clone(&self.store);
        let id = id.to_owned();
        Self::blocking(move || Ok(store.has_entry(&id)))
            .await
            .unwrap_or(false)
    }
}

#[cfg(unix)]
fn write_private_key_file(path: &std::path::Path, bytes: &[u8]) -> Result<(), AuthError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| AuthError::crypto_fault(format!("failed to create private key file: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| AuthError::crypto_fault(format!("failed to write private key file: {e}")))
}

#[cfg(not(unix))]
fn write_private_key_file(path: &std::path::Path, bytes: &[u8]) -> Result<(), AuthError> {
    fs::write(path, bytes)
        .map_err(|e| AuthError::crypto_fault(format!("failed to write private key file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Interval;

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            credentials_dir: dir.to_path_buf(),
            tgt_validity_ns: 60_000_000_000,
            cst_validity_ns: 60_000_000_000,
            worker_threads: 2,
        }
    }

    async fn boot(dir: &std::path::Path) -> Controller {
        let controller = Controller::init(settings(dir)).await.unwrap();
        controller.activate().await.unwrap();
        controller
    }

    fn encrypt_under(key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        crypto::symmetric::encrypt_bytes(plaintext, key).unwrap()
    }

    #[tokio::test]
    async fn bootstrap_register_then_kdc_round_trip_s1_s4() {
        let dir = tempfile::tempdir().unwrap();
        let controller = boot(dir.path()).await;

        assert!(controller.initial_password_required());
        let password = controller.get_initial_password().await.unwrap();

        let root_key = crypto::hash("root_pw");
        let sealed = encrypt_under(&crypto::hash(&password), &root_key);
        let change = LoginCredentialsChange {
            id: "root".to_owned(),
            wrapper: TicketAuthenticatorWrapper {
                ticket: Vec::new(),
                authenticator: Vec::new(),
            },
            old_credentials: Vec::new(),
            new_credentials: sealed,
            admin: true,
        };
        let response = controller.register(change).await.unwrap();
        assert!(response.is_none());
        assert!(controller.get_initial_password().await.is_none());
        assert!(!controller.initial_password_required());
        assert!(controller.has_user("root@").await);
        assert!(controller.is_admin("root@").await);

        // A second bootstrap attempt must fail now that the store is marked.
        let replay = LoginCredentialsChange {
            id: "someone".to_owned(),
            wrapper: TicketAuthenticatorWrapper {
                ticket: Vec::new(),
                authenticator: Vec::new(),
            },
            old_credentials: Vec::new(),
            new_credentials: Vec::new(),
            admin: true,
        };
        let err = controller.register(replay).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));

        let wrapper = controller
            .request_ticket_granting_ticket("root@")
            .await
            .unwrap();
        let unwrapped =
            crypto::symmetric::decrypt_bytes(&wrapper.session_key, &root_key).unwrap();
        let ticket: crate::message::Ticket =
            crypto::decrypt_symmetric(&wrapper.ticket, &controller.tgs_secret_key).unwrap();
        assert_eq!(unwrapped, ticket.session_key);
    }

    #[tokio::test]
    async fn non_admin_register_attempt_is_denied_s5() {
        let dir = tempfile::tempdir().unwrap();
        let controller = boot(dir.path()).await;
        let password = controller.get_initial_password().await.unwrap();
        let alice_key = crypto::hash("alice_pw");
        controller
            .register(LoginCredentialsChange {
                id: "alice".to_owned(),
                wrapper: TicketAuthenticatorWrapper {
                    ticket: Vec::new(),
                    authenticator: Vec::new(),
                },
                old_credentials: Vec::new(),
                new_credentials: encrypt_under(&crypto::hash(&password), &alice_key),
                admin: false,
            })
            .await
            .unwrap();

        let tgt = controller
            .request_ticket_granting_ticket("alice@")
            .await
            .unwrap();
        let tgs_session_key: [u8; 16] =
            crypto::symmetric::decrypt_bytes(&tgt.session_key, &alice_key)
                .unwrap()
                .try_into()
                .unwrap();
        let now = handler::now_ns();
        let authenticator = crate::message::Authenticator {
            client_id: "alice@".to_owned(),
            timestamp_ns: now,
        };
        let sealed_authenticator =
            crypto::encrypt_symmetric(&authenticator, &tgs_session_key).unwrap();
        let tgs_wrapper = TicketAuthenticatorWrapper {
            ticket: tgt.ticket.clone(),
            authenticator: sealed_authenticator,
        };
        let cst = controller
            .request_client_server_ticket(tgs_wrapper)
            .await
            .unwrap();
        let cst_session_key: [u8; 16] =
            crypto::symmetric::decrypt_bytes(&cst.session_key, &tgs_session_key)
                .unwrap()
                .try_into()
                .unwrap();
        let ss_authenticator = crate::message::Authenticator {
            client_id: "alice@".to_owned(),
            timestamp_ns: now,
        };
        let sealed_ss_authenticator =
            crypto::encrypt_symmetric(&ss_authenticator, &cst_session_key).unwrap();
        let ss_wrapper = TicketAuthenticatorWrapper {
            ticket: cst.ticket.clone(),
            authenticator: sealed_ss_authenticator,
        };

        let err = controller
            .register(LoginCredentialsChange {
                id: "bob".to_owned(),
                wrapper: ss_wrapper,
                old_credentials: Vec::new(),
                new_credentials: Vec::new(),
                admin: true,
            })
            .await
            .unwrap_err();
        // register() has already passed through AuthError::into_remote, so
        // the internal PermissionDenied surfaces as Rejected here, per
        // spec.md §7's remote-callable translation boundary.
        match err {
            AuthError::Rejected(_) => {}
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn remove_user_refuses_self_removal() {
        let dir = tempfile::tempdir().unwrap();
        let controller = boot(dir.path()).await;
        let password = controller.get_initial_password().await.unwrap();
        controller
            .register(LoginCredentialsChange {
                id: "root".to_owned(),
                wrapper: TicketAuthenticatorWrapper {
                    ticket: Vec::new(),
                    authenticator: Vec::new(),
                },
                old_credentials: Vec::new(),
                new_credentials: encrypt_under(&crypto::hash(&password), &crypto::hash("root_pw")),
                admin: true,
            })
            .await
            .unwrap();

        let tgt = controller
            .request_ticket_granting_ticket("root@")
            .await
            .unwrap();
        let root_key = crypto::hash("root_pw");
        let tgs_session_key: [u8; 16] =
            crypto::symmetric::decrypt_bytes(&tgt.session_key, &root_key)
                .unwrap()
                .try_into()
                .unwrap();
        let now = handler::now_ns();
        let authenticator = crate::message::Authenticator {
            client_id: "root@".to_owned(),
            timestamp_ns: now,
        };
        let tgs_wrapper = TicketAuthenticatorWrapper {
            ticket: tgt.ticket.clone(),
            authenticator: crypto::encrypt_symmetric(&authenticator, &tgs_session_key).unwrap(),
        };
        let cst = controller
            .request_client_server_ticket(tgs_wrapper)
            .await
            .unwrap();
        let cst_session_key: [u8; 16] =
            crypto::symmetric::decrypt_bytes(&cst.session_key, &tgs_session_key)
                .unwrap()
                .try_into()
                .unwrap();
        let ss_authenticator = crate::message::Authenticator {
            client_id: "root@".to_owned(),
            timestamp_ns: now,
        };
        let ss_wrapper = TicketAuthenticatorWrapper {
            ticket: cst.ticket.clone(),
            authenticator: crypto::encrypt_symmetric(&ss_authenticator, &cst_session_key).unwrap(),
        };

        let err = controller
            .remove_user(LoginCredentialsChange {
                id: "root".to_owned(),
                wrapper: ss_wrapper,
                old_credentials: Vec::new(),
                new_credentials: Vec::new(),
                admin: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[test]
    fn interval_sanity() {
        let interval = Interval::new(0, 10);
        assert!(interval.contains(5));
    }

    #[tokio::test]
    async fn service_server_key_release_s6() {
        let dir = tempfile::tempdir().unwrap();
        let controller = boot(dir.path()).await;

        let tgt = controller
            .request_ticket_granting_ticket("@SERVICE_SERVER_ID")
            .await
            .unwrap();

        let private_key_bytes = std::fs::read(dir.path().join(PRIVATE_KEY_FILE_NAME)).unwrap();
        let private_key = asymmetric::decode_private_key(&private_key_bytes).unwrap();
        let tgs_session_key: [u8; 16] = asymmetric::unwrap(&tgt.session_key, &private_key)
            .unwrap()
            .try_into()
            .unwrap();

        let now = handler::now_ns();
        let authenticator = crate::message::Authenticator {
            client_id: "@SERVICE_SERVER_ID".to_owned(),
            timestamp_ns: now,
        };
        let tgs_wrapper = TicketAuthenticatorWrapper {
            ticket: tgt.ticket.clone(),
            authenticator: crypto::encrypt_symmetric(&authenticator, &tgs_session_key).unwrap(),
        };
        let cst = controller
            .request_client_server_ticket(tgs_wrapper)
            .await
            .unwrap();
        let cst_session_key: [u8; 16] =
            crypto::symmetric::decrypt_bytes(&cst.session_key, &tgs_session_key)
                .unwrap()
                .try_into()
                .unwrap();
        let ss_authenticator = crate::message::Authenticator {
            client_id: "@SERVICE_SERVER_ID".to_owned(),
            timestamp_ns: now,
        };
        let ss_wrapper = TicketAuthenticatorWrapper {
            ticket: cst.ticket.clone(),
            authenticator: crypto::encrypt_symmetric(&ss_authenticator, &cst_session_key).unwrap(),
        };

        let value = controller
            .request_service_server_secret_key(ss_wrapper)
            .await
            .unwrap();
        let released = crypto::symmetric::decrypt_bytes(&value.value, &cst_session_key).unwrap();
        assert_eq!(released, controller.ss_secret_key.to_vec());
    }
}
