//! Beat analysis HTTP service.
//!
//! A small Axum server with three routes: `/` and `/health` report liveness
//! and whether audio decoding is available, `/analyze-audio` accepts one
//! multipart upload and returns tempo, key and confidence.

mod routes;

pub use routes::{build_router, run_http_server, AppState, HttpServerError, UPLOAD_FIELD, UPLOAD_PREFIX};

use std::net::{IpAddr, SocketAddr};

use anyhow::Context;

use crate::analysis::AnalysisCapability;
use crate::config::ServerConfig;

/// Resolve the bind address from config.
pub fn bind_addr(config: &ServerConfig) -> anyhow::Result<SocketAddr> {
    let ip: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid host address {:?}", config.host))?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Serve the API with the given capability until Ctrl-C.
pub async fn serve(config: &ServerConfig, capability: AnalysisCapability) -> anyhow::Result<()> {
    let addr = bind_addr(config)?;
    log::info!(
        "[HTTP] Starting {} (decoder available: {})",
        config.service_name,
        capability.is_available()
    );
    run_http_server(AppState::new(capability, config), addr).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_from_defaults() {
        let addr = bind_addr(&ServerConfig::default()).expect("default address");
        assert_eq!(addr.port(), 8000);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn bind_addr_rejects_hostnames() {
        let config = ServerConfig {
            host: "not an ip".to_string(),
            ..ServerConfig::default()
        };
        assert!(bind_addr(&config).is_err());
    }
}
