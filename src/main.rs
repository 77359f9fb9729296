#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! MiniChain node core entrypoint (systemd-friendly).
//!
//! This binary is a minimal embedding: it parses the handful of env vars a
//! launcher would otherwise supply via its own config file format (out of
//! scope for the core itself, spec.md §1) and starts the node. The
//! interactive shell, HTTP API, and dashboard are separate, out-of-scope
//! collaborators not built here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use minichain::monitoring::metrics::Metrics;
use minichain::node::config::{NodeCoreConfig, PeerAddr};
use minichain::node::orchestrator::Node;

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse `MINICHAIN_PEERS` as `id@host:port,id@host:port,...`.
fn parse_peers(raw: &str) -> Vec<PeerAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let (identity, addr) = entry.split_once('@')?;
            Some(PeerAddr {
                identity: identity.to_string(),
                addr: addr.to_string(),
            })
        })
        .collect()
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();

    let self_id = env("MINICHAIN_SELF_ID", "A");
    let data_dir = PathBuf::from(env("MINICHAIN_DATA_DIR", "./data"));
    let listen_addr = env("MINICHAIN_LISTEN_ADDR", "0.0.0.0:4001");
    let peers = parse_peers(&env("MINICHAIN_PEERS", ""));

    let metrics = Arc::new(Metrics::new().expect("metrics init failed"));

    let config = NodeCoreConfig {
        self_id: self_id.clone(),
        peers,
        data_dir,
        listen_addr,
        block_interval: Duration::from_secs(1),
        proposal_timeout: Duration::from_secs(10),
        quorum_size: None,
        max_txs: 500,
        tick_interval: Duration::from_secs(1),
        heartbeat_enabled: true,
        heartbeat_interval: Duration::from_secs(5),
    };

    info!(node = %self_id, "minichain node core starting");

    let node = match Node::new(config, metrics) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("node init failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = node.start().await {
        eprintln!("node start failed: {e}");
        std::process::exit(1);
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown signal received");
            node.stop().await;
        }
        Err(e) => {
            warn!(?e, "failed to listen for shutdown signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identity_at_host_port_pairs() {
        let peers = parse_peers("B@10.0.0.2:4001, C@10.0.0.3:4001");
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].identity, "B");
        assert_eq!(peers[0].addr, "10.0.0.2:4001");
    }

    #[test]
    fn ignores_blank_entries() {
        assert!(parse_peers("").is_empty());
        assert!(parse_peers("  ,  ").is_empty());
    }
}
