//! Minimal local HTTP server standing in for a chat webhook.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Start a server that answers every POST with `status_line` and forwards
/// each request body to the returned receiver.
pub async fn serve(status_line: &str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let status_line = status_line.to_owned();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let status_line = status_line.clone();
            tokio::spawn(async move {
                if let Some(body) = handle(socket, &status_line).await {
                    let _ = tx.send(body);
                }
            });
        }
    });

    (format!("http://{addr}/robot/send?access_token=test"), rx)
}

async fn handle(mut socket: TcpStream, status_line: &str) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0_u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    let response =
        format!("HTTP/1.1 {status_line}\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}");
    let _ = socket.write_all(response.as_bytes()).await;

    Some(String::from_utf8_lossy(&data[header_end..]).into_owned())
}
