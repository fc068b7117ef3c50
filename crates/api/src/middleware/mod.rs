//! Request extractors shared by handlers.
//!
//! - [`auth::AuthUser`] -- the owner id from a JWT Bearer token.
//! - [`client_addr::ClientAddr`] -- the requester's network address, used
//!   to direct task notifications back to the right WebSocket.

pub mod auth;
pub mod client_addr;
