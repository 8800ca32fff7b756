//! QUIC transport on quinn.
//!
//! One bidirectional stream per connection carries length-prefixed frames.

use super::{stream, FramedConnection, ALPN};
use rsock_core::endpoint::HostPort;
use rsock_core::options::ClientOptions;
use rsock_core::transport::TransportFeatures;
use rsock_core::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

pub(super) async fn connect(
    addr: &HostPort,
    features: &TransportFeatures,
    options: &ClientOptions,
) -> Result<FramedConnection> {
    let remote = tokio::net::lookup_host(addr.as_str())
        .await
        .map_err(|e| Error::connect(addr, e))?
        .next()
        .ok_or_else(|| Error::connect(addr, "address did not resolve"))?;
    let local: SocketAddr = if remote.is_ipv6() {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    };

    let mut endpoint = quinn::Endpoint::client(local).map_err(|e| Error::connect(addr, e))?;
    endpoint.set_default_client_config(client_config(features)?);

    debug!(address = %addr, %remote, "[quic] connecting");
    let connection = endpoint
        .connect(remote, addr.host())
        .map_err(|e| Error::connect(addr, e))?
        .await
        .map_err(|e| Error::connect(addr, e))?;
    let (send, recv) = connection
        .open_bi()
        .await
        .map_err(|e| Error::connect(addr, e))?;
    debug!(address = %addr, "[quic] stream open");

    Ok(stream::framed(send, recv, options, move || {
        connection.close(0u32.into(), b"closed");
        drop(endpoint);
    }))
}

fn client_config(features: &TransportFeatures) -> Result<quinn::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| Error::config(format!("TLS setup: {e}")))?;

    let mut crypto = if features.accept_invalid_certs {
        warn!("[quic] server certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    crypto.alpn_protocols = vec![ALPN.to_vec()];

    let quic = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| Error::config(format!("QUIC TLS setup: {e}")))?;
    Ok(quinn::ClientConfig::new(Arc::new(quic)))
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
