//! POS HTTP transport
//!
//! The typed REST client the session manager talks through, the API models
//! it exchanges, and the error taxonomy every failure is classified into.

pub mod client;
pub mod types;

pub use client::auth::AuthApi;
pub use client::error::{ClientError, ErrorDetails};
pub use client::{CredentialSource, PosClient, PosClientBuilder};
pub use types::{TokenPair, UserSnapshot};
