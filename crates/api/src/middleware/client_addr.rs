//! Requester address extraction.
//!
//! Behind a reverse proxy the socket peer is the proxy, so the proxy headers
//! win: `CF-Connecting-IP`, then the first hop of `X-Forwarded-For`, then
//! the peer address from [`ConnectInfo`].

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Used when neither headers nor connection info identify the client.
pub const UNKNOWN_ADDR: &str = "unknown";

/// The requester's network address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(resolve_client_addr(&parts.headers, peer_ip(parts))))
    }
}

/// All addresses a connecting client may be known by. See [`candidate_addrs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddrs(pub Vec<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddrs {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddrs(candidate_addrs(&parts.headers, peer_ip(parts))))
    }
}

/// Peer IP, present when the server was started with connect info.
fn peer_ip(parts: &Parts) -> Option<String> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Pick the address a request should be attributed to.
pub fn resolve_client_addr(headers: &HeaderMap, peer: Option<String>) -> String {
    header_value(headers, CF_CONNECTING_IP)
        .or_else(|| forwarded_for(headers))
        .or(peer)
        .unwrap_or_else(|| UNKNOWN_ADDR.to_string())
}

/// Every address a connection could be known by. A WebSocket matches an
/// origin if any of them is equal to it.
pub fn candidate_addrs(headers: &HeaderMap, peer: Option<String>) -> Vec<String> {
    let mut addrs: Vec<String> = [
        peer,
        forwarded_for(headers),
        header_value(headers, X_FORWARDED_FOR),
        header_value(headers, CF_CONNECTING_IP),
    ]
    .into_iter()
    .flatten()
    .collect();
    addrs.dedup();
    addrs
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_value(headers, X_FORWARDED_FOR)?
        .split(',')
        .next()
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
}
