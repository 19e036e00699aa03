use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::errors::{classify_context_error, classify_io_error};
use crate::engine::observations::{Observations, TcpConnectResult, TcpConnectStatus};
use crate::engine::{
    ConnSlot, Context, Endpoint, Failure, FuncError, OperationLogger, Runtime, Trace, TypedFunc,
};

/// An established TCP connection.
#[derive(Debug, Clone)]
pub struct TcpConnection {
    pub address: SocketAddr,
    pub domain: String,
    pub trace: Trace,
    pub(crate) conn: Arc<ConnSlot<TcpStream>>,
}

impl TcpConnection {
    /// Whether the runtime still owns an open stream for this connection.
    pub fn is_open(&self) -> bool {
        self.conn.is_open()
    }
}

/// Connects to an endpoint over TCP.
#[derive(Debug, Default)]
pub struct TcpConnect;

#[async_trait]
impl TypedFunc for TcpConnect {
    type Input = Endpoint;
    type Output = TcpConnection;

    fn name(&self) -> &'static str {
        "tcp_connect"
    }

    async fn call(
        &self,
        ctx: &Context,
        rtx: &Runtime,
        input: Endpoint,
    ) -> Result<TcpConnection, FuncError> {
        let trace = rtx.new_trace();
        let logger =
            OperationLogger::start(rtx.span(), &trace, format!("TCPConnect {}", input.address));
        let t0 = trace.elapsed();

        let child = ctx.with_timeout(rtx.config().timeouts.tcp_connect());
        let result = match child.run(TcpStream::connect(input.address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(err)) => Err(classify_io_error(&err)),
            Err(err) => Err(classify_context_error(err)),
        };
        let failure = result.as_ref().err().cloned();

        rtx.save_observations(Observations {
            tcp_connect: vec![TcpConnectResult {
                ip: input.address.ip().to_string(),
                port: input.address.port(),
                status: TcpConnectStatus {
                    blocked: None,
                    failure: failure.clone(),
                    success: failure.is_none(),
                },
                t0,
                t: trace.elapsed(),
                transaction_id: trace.index(),
            }],
            ..Observations::default()
        });
        logger.stop(failure.as_deref());

        let stream = result.map_err(|failure| Failure::new(self.name(), failure))?;
        let conn = ConnSlot::new(stream);
        rtx.track_closer(conn.clone());
        Ok(TcpConnection {
            address: input.address,
            domain: input.domain,
            trace,
            conn,
        })
    }
}
