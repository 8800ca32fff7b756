//! Peer-to-peer transport on iroh.
//!
//! The address is a node id; discovery resolves it to relay and direct
//! addresses. Frames are length-prefixed on one bidirectional stream.

use super::{stream, FramedConnection, ALPN};
use rsock_core::options::ClientOptions;
use rsock_core::transport::TransportFeatures;
use rsock_core::{Error, Result};
use tracing::debug;

pub(super) async fn connect(
    node: &str,
    _features: &TransportFeatures,
    options: &ClientOptions,
) -> Result<FramedConnection> {
    let node_id: iroh::NodeId = node
        .parse()
        .map_err(|e| Error::config(format!("invalid node id {node}: {e}")))?;

    let endpoint = iroh::Endpoint::builder()
        .discovery_n0()
        .bind()
        .await
        .map_err(|e| Error::connect(node, e))?;

    debug!(%node_id, "[p2p] connecting");
    let connection = endpoint
        .connect(node_id, ALPN)
        .await
        .map_err(|e| Error::connect(node, e))?;
    let (send, recv) = connection
        .open_bi()
        .await
        .map_err(|e| Error::connect(node, e))?;
    debug!(%node_id, "[p2p] stream open");

    Ok(stream::framed(send, recv, options, move || {
        connection.close(0u32.into(), b"closed");
        drop(endpoint);
    }))
}
