//! Dialing the duplex byte stream a connection runs over.
//!
//! Plain TCP or TLS (rustls with the webpki root set). Certificate
//! verification can be switched off only through
//! [`ConnectOptions::insecure`](crate::ConnectOptions::insecure).

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::config::{ConnectOptions, Scheme};
use crate::error::ConnError;

/// Any duplex byte stream a connection can run over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased transport owned by a connection.
pub type BoxedTransport = Box<dyn Transport>;

/// Open the stream described by `opts`.
pub async fn dial(opts: &ConnectOptions) -> Result<BoxedTransport, ConnError> {
    let tcp = TcpStream::connect(&opts.addr).await?;
    tcp.set_nodelay(true)?;
    tracing::debug!(addr = %opts.addr, scheme = ?opts.scheme, "tcp connected");

    match opts.scheme {
        Scheme::Tcp => Ok(Box::new(tcp)),
        Scheme::Tls => {
            let connector = TlsConnector::from(Arc::new(tls_client_config(opts.insecure)?));
            let server_name = ServerName::try_from(opts.host())
                .map_err(|e| ConnError::Tls(format!("invalid server name: {e}")))?;
            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| ConnError::Tls(format!("handshake failed: {e}")))?;
            tracing::debug!(host = %opts.host(), insecure = opts.insecure, "tls established");
            Ok(Box::new(tls))
        }
    }
}

/// Build the rustls client configuration.
///
/// With `insecure` set, the server certificate chain is accepted without
/// checks; handshake signatures are still verified against the presented
/// certificate.
pub fn tls_client_config(insecure: bool) -> Result<ClientConfig, ConnError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnError::Tls(format!("protocol versions: {e}")))?;

    let config = if insecure {
        tracing::warn!("tls certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification { provider }))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(config)
}

#[derive(Debug)]
struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
