//! Core of a Kerberos-style authentication service for a distributed
//! home-automation platform: mutual authentication between users, client
//! devices, and service servers via a three-party ticket-granting protocol.
//!
//! This crate covers the cryptographic envelope, the KDC/TGS/SS protocol
//! handler, the persistent credential store, and the administrative
//! operations layered on the ticket protocol. The RPC transport, process
//! launcher, and client-side session manager are external collaborators.

pub mod config;
pub mod controller;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod message;
pub mod principal;
pub mod store;

pub use controller::{Controller, ControllerState};
pub use error::AuthError;
