//! HTTP/1.1 over an already established byte stream.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

use super::{RequestPlan, ResponseParts};
use crate::probes::errors::{EOF_ERROR, classify_io_error, unknown_failure};

const MAX_HEAD_LINE: usize = 16 * 1024;
const MAX_HEADERS: usize = 256;

fn io_failure(err: &std::io::Error) -> String {
    classify_io_error(err)
}

/// Serializes the request head. No body is ever sent.
pub(crate) fn encode_request(plan: &RequestPlan) -> Vec<u8> {
    let mut out = format!("{} {} HTTP/1.1\r\n", plan.method, plan.request_target());
    for (name, value) in &plan.headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.into_bytes()
}

async fn read_line<R>(reader: &mut R) -> Result<String, String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(MAX_HEAD_LINE as u64)
        .read_until(b'\n', &mut line)
        .await
        .map_err(|e| io_failure(&e))?;
    if n == 0 {
        return Err(EOF_ERROR.into());
    }
    if line.last() != Some(&b'\n') {
        if n < MAX_HEAD_LINE {
            return Err(EOF_ERROR.into());
        }
        return Err(unknown_failure("HTTP line too long"));
    }
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| unknown_failure("HTTP head is not UTF-8"))
}

fn parse_status_line(line: &str) -> Result<u16, String> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(unknown_failure(format!("malformed HTTP status line {line:?}")));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..1000).contains(code))
        .ok_or_else(|| unknown_failure(format!("malformed HTTP status line {line:?}")))
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

async fn read_head<R>(reader: &mut R) -> Result<(u16, Vec<(String, String)>), String>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let status = parse_status_line(&read_line(reader).await?)?;
        let mut headers = Vec::new();
        loop {
            let line = read_line(reader).await?;
            if line.is_empty() {
                break;
            }
            if headers.len() >= MAX_HEADERS {
                return Err(unknown_failure("too many HTTP headers"));
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| unknown_failure(format!("malformed HTTP header {line:?}")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
        // Interim responses precede the final one.
        if (100..200).contains(&status) && status != 101 {
            continue;
        }
        return Ok((status, headers));
    }
}

/// Reads at most `limit` bytes of body. Returns whether more was available.
async fn read_body<R>(
    reader: &mut R,
    headers: &[(String, String)],
    limit: usize,
    out: &mut Vec<u8>,
) -> Result<bool, String>
where
    R: AsyncBufRead + Unpin,
{
    let chunked = header(headers, "transfer-encoding")
        .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"));
    if chunked {
        return read_chunked(reader, limit, out).await;
    }

    if let Some(length) = header(headers, "content-length") {
        let length: usize = length
            .parse()
            .map_err(|_| unknown_failure(format!("invalid Content-Length {length:?}")))?;
        let want = length.min(limit);
        let got = (&mut *reader)
            .take(want as u64)
            .read_to_end(out)
            .await
            .map_err(|e| io_failure(&e))?;
        if got < want {
            return Err(EOF_ERROR.into());
        }
        return Ok(length > limit);
    }

    // Delimited by connection close.
    (&mut *reader)
        .take(limit as u64 + 1)
        .read_to_end(out)
        .await
        .map_err(|e| io_failure(&e))?;
    if out.len() > limit {
        out.truncate(limit);
        return Ok(true);
    }
    Ok(false)
}

async fn read_chunked<R>(reader: &mut R, limit: usize, out: &mut Vec<u8>) -> Result<bool, String>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = read_line(reader).await?;
        let size_field = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| unknown_failure(format!("invalid chunk size {size_field:?}")))?;
        if size == 0 {
            // Trailers end with an empty line.
            while !read_line(reader).await?.is_empty() {}
            return Ok(false);
        }
        let room = limit - out.len();
        let want = size.min(room);
        let got = (&mut *reader)
            .take(want as u64)
            .read_to_end(out)
            .await
            .map_err(|e| io_failure(&e))?;
        if got < want {
            return Err(EOF_ERROR.into());
        }
        if size > room {
            return Ok(true);
        }
        read_line(reader).await?;
    }
}

/// Sends the request and reads the response head plus a body snapshot.
pub(crate) async fn round_trip<S>(
    stream: &mut S,
    plan: &RequestPlan,
    limit: usize,
) -> Result<ResponseParts, String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&encode_request(plan))
        .await
        .map_err(|e| io_failure(&e))?;
    stream.flush().await.map_err(|e| io_failure(&e))?;

    let mut reader = BufReader::new(stream);
    let (status, headers) = read_head(&mut reader).await?;
    let mut body = Vec::new();
    let no_body = plan.method == "HEAD" || status == 204 || status == 304;
    let body_is_truncated = if no_body {
        false
    } else {
        read_body(&mut reader, &headers, limit, &mut body).await?
    };
    Ok(ResponseParts {
        status,
        headers,
        body,
        body_is_truncated,
    })
}
