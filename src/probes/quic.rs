use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use quinn::crypto::rustls::{HandshakeData, QuicClientConfig};
use rustls_pki_types::CertificateDer;

use super::errors::{
    classify_context_error, classify_io_error, classify_quic_error, unknown_failure,
};
use super::tls::{TlsOptions, encode_certificates};
use crate::engine::observations::{HandshakeResult, Observations};
use crate::engine::{
    ConnSlot, Context, Endpoint, Exception, Failure, FuncError, OperationLogger, Runtime, Trace,
    TypedFunc,
};

/// ALPN offered over QUIC when a program does not choose one.
pub const DEFAULT_QUIC_ALPN: &[&str] = &["h3"];

/// A QUIC connection together with the endpoint driving it. Dropping it
/// closes the connection.
pub(crate) struct QuicSession {
    pub(crate) endpoint: quinn::Endpoint,
    pub(crate) connection: quinn::Connection,
}

impl Drop for QuicSession {
    fn drop(&mut self) {
        // The endpoint only drives this connection.
        self.endpoint.close(0_u32.into(), b"");
    }
}

/// An established QUIC connection.
#[derive(Debug, Clone)]
pub struct QuicConnection {
    pub address: SocketAddr,
    pub domain: String,
    pub negotiated_protocol: String,
    pub trace: Trace,
    pub(crate) conn: Arc<ConnSlot<QuicSession>>,
}

impl QuicConnection {
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }
}

/// Performs a QUIC handshake with an endpoint.
#[derive(Debug, Default)]
pub struct QuicHandshake {
    options: TlsOptions,
}

impl QuicHandshake {
    pub fn new(options: TlsOptions) -> Self {
        Self { options }
    }

    fn client_config(&self) -> Result<quinn::ClientConfig, Exception> {
        let tls = self
            .options
            .client_config("quic_handshake", DEFAULT_QUIC_ALPN, true)?;
        let crypto = QuicClientConfig::try_from(Arc::new(tls))
            .map_err(|e| Exception::new(format!("quic_handshake: {e}")))?;
        Ok(quinn::ClientConfig::new(Arc::new(crypto)))
    }
}

async fn handshake(
    config: quinn::ClientConfig,
    address: SocketAddr,
    server_name: &str,
) -> Result<QuicSession, String> {
    let local: SocketAddr = match address {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let endpoint = quinn::Endpoint::client(local).map_err(|e| classify_io_error(&e))?;
    let connecting = endpoint
        .connect_with(config, address, server_name)
        .map_err(unknown_failure)?;
    let connection = connecting.await.map_err(|e| classify_quic_error(&e))?;
    Ok(QuicSession {
        endpoint,
        connection,
    })
}

#[async_trait]
impl TypedFunc for QuicHandshake {
    type Input = Endpoint;
    type Output = QuicConnection;

    fn name(&self) -> &'static str {
        "quic_handshake"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: Endpoint,
    ) -> Result<QuicConnection, FuncError> {
        let config = self.client_config()?;
        let server_name = self.options.server_name(&input.domain);
        let alpn = self
            .options
            .alpn
            .clone()
            .unwrap_or_else(|| DEFAULT_QUIC_ALPN.iter().map(ToString::to_string).collect());

        let trace = rtx.new_trace();
        let logger = OperationLogger::start(
            rtx.span(),
            &trace,
            format!(
                "QUICHandshake {} SNI={server_name} ALPN={:?}",
                input.address, alpn
            ),
        );
        let t0 = trace.elapsed();

        let child = ctx.with_timeout(rtx.config().timeouts.quic_handshake());
        let result = match child
            .run(handshake(config, input.address, &server_name))
            .await
        {
            Ok(result) => result,
            Err(err) => Err(classify_context_error(err)),
        };

        let mut observation = HandshakeResult {
            network: "udp".into(),
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
        if let Ok(session) = &result {
            observation.tls_version = "TLSv1.3".into();
            observation.negotiated_protocol = session
                .connection
                .handshake_data()
                .and_then(|data| data.downcast::<HandshakeData>().ok())
                .and_then(|data| data.protocol)
                .map(|p| String::from_utf8_lossy(&p).into_owned())
                .unwrap_or_default();
            let certs = session
                .connection
                .peer_identity()
                .and_then(|id| id.downcast::<Vec<CertificateDer<'static>>>().ok());
            observation.peer_certificates =
                encode_certificates(certs.as_deref().map(Vec::as_slice));
        }
        let negotiated_protocol = observation.negotiated_protocol.clone();
        rtx.save_observations(Observations {
            quic_handshakes: vec![observation],
            ..Observations::default()
        });
        logger.stop(result.as_ref().err().map(String::as_str));

        let session = result.map_err(|failure| Failure::new(self.name(), failure))?;
        let conn = ConnSlot::new(session);
        rtx.track_closer(conn.clone());
        Ok(QuicConnection {
            address: input.address,
            domain: input.domain,
            negotiated_protocol,
            trace,
            conn,
        })
    }
}
