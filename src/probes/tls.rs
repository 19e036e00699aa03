use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{DigitallySignedStruct, ProtocolVersion, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::errors::{classify_context_error, classify_io_error};
use super::tcp::TcpConnection;
use crate::engine::observations::{HandshakeResult, Observations};
use crate::engine::{
    ConnSlot, Context, Exception, Failure, FuncError, OperationLogger, Runtime, Trace, TypedFunc,
};

/// ALPN offered over TCP when a program does not choose one.
pub const DEFAULT_TLS_ALPN: &[&str] = &["http/1.1"];

/// Handshake options shared by TLS and QUIC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Protocols to offer; `None` selects the transport default.
    pub alpn: Option<Vec<String>>,

    /// Server name to send; `None` uses the endpoint domain.
    pub sni: Option<String>,

    /// Accept any certificate.
    pub skip_verify: bool,

    /// PEM-encoded roots replacing the bundled ones.
    pub x509_certs: Vec<String>,
}

impl TlsOptions {
    pub(crate) fn server_name(&self, domain: &str) -> String {
        self.sni.clone().unwrap_or_else(|| domain.to_string())
    }

    fn root_store(&self) -> Result<RootCertStore, String> {
        if self.x509_certs.is_empty() {
            return Ok(webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect());
        }
        let mut store = RootCertStore::empty();
        for pem in &self.x509_certs {
            for cert in CertificateDer::pem_slice_iter(pem.as_bytes()) {
                let cert = cert.map_err(|e| format!("cannot parse PEM certificate: {e}"))?;
                store
                    .add(cert)
                    .map_err(|e| format!("cannot use certificate: {e}"))?;
            }
        }
        if store.is_empty() {
            return Err("no usable certificate in x509_certs".into());
        }
        Ok(store)
    }

    /// Builds the client configuration. Failure means the options cannot be
    /// turned into a usable configuration.
    pub(crate) fn client_config(
        &self,
        operation: &str,
        default_alpn: &[&str],
        tls13_only: bool,
    ) -> Result<rustls::ClientConfig, Exception> {
        let exception = |message: String| Exception::new(format!("{operation}: {message}"));
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(provider.clone());
        let builder = if tls13_only {
            builder.with_protocol_versions(&[&rustls::version::TLS13])
        } else {
            builder.with_safe_default_protocol_versions()
        };
        let builder = builder.map_err(|e| exception(e.to_string()))?;

        let mut config = if self.skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerify(provider)))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(self.root_store().map_err(exception)?)
                .with_no_client_auth()
        };
        config.alpn_protocols = match &self.alpn {
            Some(alpn) => alpn.iter().map(|p| p.as_bytes().to_vec()).collect(),
            None => default_alpn.iter().map(|p| p.as_bytes().to_vec()).collect(),
        };
        Ok(config)
    }
}

/// Accepts any server certificate; signatures are still checked.
#[derive(Debug)]
struct NoVerify(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerify {
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
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
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

pub(crate) fn tls_version_name(version: Option<ProtocolVersion>) -> String {
    match version {
        Some(ProtocolVersion::TLSv1_3) => "TLSv1.3".into(),
        Some(ProtocolVersion::TLSv1_2) => "TLSv1.2".into(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}

pub(crate) fn alpn_names(protocols: &[Vec<u8>]) -> Vec<String> {
    protocols
        .iter()
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect()
}

pub(crate) fn encode_certificates(certs: Option<&[CertificateDer<'_>]>) -> Vec<String> {
    certs
        .unwrap_or_default()
        .iter()
        .map(|cert| base64::engine::general_purpose::STANDARD.encode(cert.as_ref()))
        .collect()
}

/// An established TLS connection over TCP.
#[derive(Debug, Clone)]
pub struct TlsConnection {
    pub address: SocketAddr,
    pub domain: String,
    pub negotiated_protocol: String,
    pub trace: Trace,
    pub(crate) conn: Arc<ConnSlot<TlsStream<TcpStream>>>,
}

impl TlsConnection {
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }
}

/// Performs a TLS handshake over a TCP connection. The TCP stream moves
/// into the TLS connection; the trace is reused.
#[derive(Debug, Default)]
pub struct TlsHandshake {
    options: TlsOptions,
}

impl TlsHandshake {
    pub fn new(options: TlsOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TypedFunc for TlsHandshake {
    type Input = TcpConnection;
    type Output = TlsConnection;

    fn name(&self) -> &'static str {
        "tls_handshake"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: TcpConnection,
    ) -> Result<TlsConnection, FuncError> {
        let config = self
            .options
            .client_config(self.name(), DEFAULT_TLS_ALPN, false)?;
        let server_name = self.options.server_name(&input.domain);
        let sni = ServerName::try_from(server_name.clone()).map_err(|e| {
            Exception::new(format!("{}: invalid server name {server_name:?}: {e}", self.name()))
        })?;
        let stream = input.conn.take().ok_or_else(|| {
            Exception::new(format!("{}: TCP connection is no longer available", self.name()))
        })?;

        let trace = input.trace;
        let logger = OperationLogger::start(
            rtx.span(),
            &trace,
            format!(
                "TLSHandshake {} SNI={server_name} ALPN={:?}",
                input.address,
                alpn_names(&config.alpn_protocols)
            ),
        );
        let t0 = trace.elapsed();

        let connector = TlsConnector::from(Arc::new(config));
        let child = ctx.with_timeout(rtx.config().timeouts.tls_handshake());
        let result = match child.run(connector.connect(sni, stream)).await {
            Ok(Ok(tls)) => Ok(tls),
            Ok(Err(err)) => Err(classify_io_error(&err)),
            Err(err) => Err(classify_context_error(err)),
        };

        let mut observation = HandshakeResult {
            network: "tcp".into(),
            address: input.address.to_string(),
            cipher_suite: String::new(),
            failure: result.as_ref().err().cloned(),
            negotiated_protocol: String::new(),
            no_tls_verify: self.options.skip_verify,
            peer_certificates: Vec::new(),
            server_name: server_name.clone(),
            t0,
            t: trace.elapsed(),
            tls_version: String::new(),
            transaction_id: trace.index(),
        };
        if let Ok(tls) = &result {
            let (_, session) = tls.get_ref();
            observation.cipher_suite = session
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite()))
                .unwrap_or_default();
            observation.negotiated_protocol = session
                .alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default();
            observation.peer_certificates = encode_certificates(session.peer_certificates());
            observation.tls_version = tls_version_name(session.protocol_version());
        }
        let negotiated_protocol = observation.negotiated_protocol.clone();
        rtx.save_observations(Observations {
            tls_handshakes: vec![observation],
            ..Observations::default()
        });
        logger.stop(result.as_ref().err().map(String::as_str));

        let tls = result.map_err(|failure| Failure::new(self.name(), failure))?;
        let conn = ConnSlot::new(tls);
        rtx.track_closer(conn.clone());
        Ok(TlsConnection {
            address: input.address,
            domain: input.domain,
            negotiated_protocol,
            trace,
            conn,
        })
    }
}
