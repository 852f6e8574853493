use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::state::AppState;

/// Network origin of a request, recorded on sessions and audit entries and
/// used as the rate-limit key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Resolve the client IP.
    ///
    /// The socket peer is the client unless it is one of `trusted_proxies`.
    /// Only then are `X-Forwarded-For` and `X-Real-IP` read: the forwarded
    /// chain is walked from the right and the first hop that is not itself a
    /// trusted proxy is taken.
    pub fn from_headers(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trusted_proxies: &[IpAddr],
    ) -> Self {
        let peer_ip = peer.map(|addr| addr.ip());

        let ip_address = match peer_ip {
            Some(ip) if trusted_proxies.contains(&ip) => {
                forwarded_client(headers, trusted_proxies).unwrap_or(ip)
            }
            Some(ip) => ip,
            None => {
                return ClientInfo {
                    ip_address: None,
                    user_agent: user_agent(headers),
                };
            }
        };

        ClientInfo {
            ip_address: Some(ip_address.to_string()),
            user_agent: user_agent(headers),
        }
    }

    /// Key for per-client rate limiting.
    pub fn rate_limit_key(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("unknown")
    }
}

fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let hops: Vec<IpAddr> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|hop| hop.trim().parse().ok())
        .collect();

    if !hops.is_empty() {
        return hops
            .iter()
            .rev()
            .find(|hop| !trusted_proxies.contains(hop))
            .or_else(|| hops.first())
            .copied();
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

impl<S> FromRequestParts<S> for ClientInfo
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientInfo::from_headers(
            &parts.headers,
            peer,
            &state.config.security.trusted_proxies,
        ))
    }
}
