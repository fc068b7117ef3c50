//! Bearer-token identity.
//!
//! - [`jwt`] -- HS256 token validation (and issuance, for operators and tests).

pub mod jwt;
