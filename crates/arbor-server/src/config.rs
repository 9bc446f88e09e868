//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

/// Runtime configuration for the signaling server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// TCP port the WebSocket endpoint listens on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 3030 }
    }
}

impl ServerConfig {
    /// Read configuration from the environment.
    ///
    /// `ARBOR_PORT` wins over `PORT`; anything unparseable falls back to
    /// the default.
    pub fn from_env() -> Self {
        let port = std::env::var("ARBOR_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_else(|| ServerConfig::default().port);
        ServerConfig { port }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
