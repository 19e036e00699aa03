//! HTTP/3 over an established QUIC connection.

use bytes::{Buf, Bytes};

use super::{RequestPlan, ResponseParts};
use crate::probes::errors::unknown_failure;

fn h3_failure(err: &h3::Error) -> String {
    unknown_failure(err)
}

fn build_request(plan: &RequestPlan) -> Result<http::Request<()>, String> {
    let mut builder = http::Request::builder()
        .method(plan.method.as_str())
        .uri(plan.url.as_str());
    for (name, value) in &plan.headers {
        // The authority pseudo-header carries the host.
        if name.eq_ignore_ascii_case("host") {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(()).map_err(unknown_failure)
}

/// Sends the request and reads the response head plus a body snapshot.
pub(crate) async fn round_trip(
    connection: quinn::Connection,
    plan: &RequestPlan,
    limit: usize,
) -> Result<ResponseParts, String> {
    let request = build_request(plan)?;
    let (mut driver, mut sender) =
        h3::client::new(h3_quinn::Connection::new(connection))
            .await
            .map_err(|e| h3_failure(&e))?;
    let drive = tokio::spawn(async move {
        let _ = futures_util::future::poll_fn(|cx| driver.poll_close(cx)).await;
    });

    let result = async {
        let mut stream = sender
            .send_request(request)
            .await
            .map_err(|e| h3_failure(&e))?;
        stream.finish().await.map_err(|e| h3_failure(&e))?;
        let response = stream.recv_response().await.map_err(|e| h3_failure(&e))?;

        let mut body: Vec<u8> = Vec::new();
        let mut body_is_truncated = false;
        while let Some(mut chunk) = stream.recv_data().await.map_err(|e| h3_failure(&e))? {
            let room = limit - body.len();
            let take = chunk.remaining().min(room);
            let data: Bytes = chunk.copy_to_bytes(take);
            body.extend_from_slice(&data);
            if chunk.has_remaining() {
                body_is_truncated = true;
                break;
            }
        }

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        Ok::<_, String>(ResponseParts {
            status: response.status().as_u16(),
            headers,
            body,
            body_is_truncated,
        })
    }
    .await;

    drop(sender);
    drive.abort();
    result
}
