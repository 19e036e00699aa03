//! Loopback servers for network tests. Nothing here leaves 127.0.0.1.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// A port on which nothing listens.
pub async fn closed_tcp_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Accepts connections forever and keeps them open until the peer closes.
/// Each accepted connection reports how many bytes it read before EOF.
pub async fn sink_server() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = socket.read_to_end(&mut buf).await;
                let _ = tx.send(buf.len());
            });
        }
    });
    (address, rx)
}

/// Answers one HTTP/1.1 request per connection with `body`.
pub async fn http_server(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_head(&mut socket).await.is_none() {
                    return;
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    address
}

/// Reads a request head, up to and including the blank line.
async fn read_head<S: AsyncRead + Unpin>(socket: &mut S) -> Option<Vec<u8>> {
    let mut head = Vec::new();
    let mut byte = [0_u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => return None,
        }
    }
    Some(head)
}

fn tls_acceptor(alpn: &[&str]) -> TlsAcceptor {
    let certs = CertificateDer::pem_slice_iter(include_bytes!("localhost.crt"))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = PrivateKeyDer::from_pem_slice(include_bytes!("localhost.key")).unwrap();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    config.alpn_protocols = alpn.iter().map(|p| p.as_bytes().to_vec()).collect();
    TlsAcceptor::from(Arc::new(config))
}

/// Serves `localhost` over TLS, offering `alpn` in preference order.
///
/// Connections that negotiate HTTP/1.1, or nothing, get one answer with
/// `body`. Any other protocol gets no answer. Each connection reports the
/// protocol it negotiated and every byte it received before EOF.
pub async fn https_server(
    alpn: &[&str],
    body: &'static str,
) -> (SocketAddr, UnboundedReceiver<(String, Vec<u8>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let acceptor = tls_acceptor(alpn);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(socket).await else {
                    return;
                };
                let protocol = tls
                    .get_ref()
                    .1
                    .alpn_protocol()
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .unwrap_or_default();

                let mut received = Vec::new();
                if protocol.is_empty() || protocol == "http/1.1" {
                    if let Some(head) = read_head(&mut tls).await {
                        received = head;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
                            body.len()
                        );
                        let _ = tls.write_all(response.as_bytes()).await;
                        let _ = tls.flush().await;
                    }
                } else {
                    let mut chunk = [0_u8; 1024];
                    while let Ok(n @ 1..) = tls.read(&mut chunk).await {
                        received.extend_from_slice(&chunk[..n]);
                    }
                }
                let _ = tx.send((protocol, received));
            });
        }
    });
    (address, rx)
}

/// A UDP DNS server answering A queries with `v4` and AAAA queries with
/// `v6`. Every other query gets an empty answer.
pub async fn dns_server(v4: Vec<IpAddr>, v6: Vec<IpAddr>) -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let address = socket.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut buf = [0_u8; 512];
        while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
            let reply = dns_reply(&buf[..n], &v4, &v6);
            let _ = socket.send_to(&reply, peer).await;
        }
    });
    (address, handle)
}

fn dns_reply(query: &[u8], v4: &[IpAddr], v6: &[IpAddr]) -> Vec<u8> {
    // The question ends after the root label, the type and the class.
    let mut end = 12;
    while query[end] != 0 {
        end += usize::from(query[end]) + 1;
    }
    end += 5;
    let qtype = u16::from_be_bytes([query[end - 4], query[end - 3]]);
    let answers: Vec<&IpAddr> = match qtype {
        1 => v4.iter().collect(),
        28 => v6.iter().collect(),
        _ => Vec::new(),
    };

    let mut out = Vec::new();
    out.extend_from_slice(&query[..2]);
    out.extend_from_slice(&0x8180_u16.to_be_bytes());
    out.extend_from_slice(&1_u16.to_be_bytes());
    out.extend_from_slice(&u16::try_from(answers.len()).unwrap().to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&query[12..end]);
    for address in answers {
        out.extend_from_slice(&[0xc0, 0x0c]);
        out.extend_from_slice(&qtype.to_be_bytes());
        out.extend_from_slice(&1_u16.to_be_bytes());
        out.extend_from_slice(&300_u32.to_be_bytes());
        let rdata = match address {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        out.extend_from_slice(&u16::try_from(rdata.len()).unwrap().to_be_bytes());
        out.extend_from_slice(&rdata);
    }
    out
}
