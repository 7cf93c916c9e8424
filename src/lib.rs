#![doc = include_str!("../README.md")]

pub mod api;
pub mod config;
pub mod error;
pub mod router;
pub mod session;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use api::{ApiClient, ApiConfig, TokenResponse};
pub use config::PortalConfig;
pub use error::Error;
pub use router::{View, ViewRouter, is_admin_path, route};
pub use session::{Credentials, Session, SessionManager, SessionStatus};
pub use store::{CredentialStore, FileStore, MemoryStore, ROLE_KEY, TOKEN_KEY};
pub use types::{AccessToken, Endpoints, Role, UserProfile};
