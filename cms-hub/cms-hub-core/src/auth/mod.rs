//! Who is making a request, and whether they may change documents.
//!
//! The document store only asks [`Authenticator::is_authenticated`]; password
//! hashing and token handling stay in this module.

pub mod credentials;
pub mod token;

pub use credentials::CredentialStore;
pub use token::{Claims, Hs256Tokens, TokenVerifier};

/// Identity attached to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    SignedIn(String),
}

impl Principal {
    pub fn signed_in(username: impl Into<String>) -> Self {
        Principal::SignedIn(username.into())
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::SignedIn(name) => Some(name),
        }
    }
}

/// Decides whether a principal counts as signed in.
pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self, principal: &Principal) -> bool;
}

/// Accepts every signed-in principal without consulting a credential store.
///
/// Used where identity was already established upstream, e.g. by a verified
/// token.
pub struct SignedInOnly;

impl Authenticator for SignedInOnly {
    fn is_authenticated(&self, principal: &Principal) -> bool {
        matches!(principal, Principal::SignedIn(name) if !name.is_empty())
    }
}
