//! Static file server with a live-reload channel.
//!
//! Small HTTP/1.1 responder on tokio's TCP stack: serves the site root,
//! injects a reload snippet into HTML and exposes a server-sent-events
//! endpoint the snippet subscribes to. The watch loop broadcasts on the
//! shared channel after each successful rebuild.

use crate::config::constants;
use crate::error::Result;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info};

const LIVE_RELOAD_SNIPPET: &str = concat!(
    "<script>new EventSource(\"/__livereload\")",
    ".addEventListener(\"reload\",function(){location.reload();});</script>"
);

/// Serve `root` until the process is terminated
pub async fn serve(root: PathBuf, port: u16, reload: broadcast::Sender<()>) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Serving {:?} on http://127.0.0.1:{}", root, port);

    loop {
        let (stream, peer) = listener.accept().await?;
        let root = root.clone();
        let reload = reload.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, &root, reload).await {
                debug!("Client {} closed: {}", peer, e);
            }
        });
    }
}

async fn handle_client(
    stream: TcpStream,
    root: &Path,
    reload: broadcast::Sender<()>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers; nothing in them changes how we respond
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("/");

    if method != "GET" {
        return write_response(
            &mut write_half,
            "405 Method Not Allowed",
            "text/plain",
            b"method not allowed",
        )
        .await;
    }

    let path = target.split('?').next().unwrap_or("/");

    if path == constants::LIVERELOAD_PATH {
        return stream_events(write_half, reload.subscribe()).await;
    }

    let Some(file) = resolve(root, path) else {
        return write_response(&mut write_half, "403 Forbidden", "text/plain", b"forbidden").await;
    };

    match tokio::fs::read(&file).await {
        Ok(body) => {
            let mime = content_type(&file);
            let body = if mime == "text/html" {
                inject_snippet(body)
            } else {
                body
            };
            debug!("GET {} -> {:?} ({} bytes)", path, file, body.len());
            write_response(&mut write_half, "200 OK", mime, &body).await
        }
        Err(_) => {
            write_response(&mut write_half, "404 Not Found", "text/plain", b"not found").await
        }
    }
}

/// Map a request path onto the site root; directory requests fall back to
/// index.html. Paths that escape the root are rejected.
fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    let rel = path.trim_start_matches('/');
    let rel_path = Path::new(rel);
    if rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let mut file = root.join(rel_path);
    if file.is_dir() || rel.is_empty() {
        file = file.join("index.html");
    }
    Some(file)
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Splice the reload snippet into an HTML document, before `</body>` when
/// present
fn inject_snippet(body: Vec<u8>) -> Vec<u8> {
    match String::from_utf8(body) {
        Ok(text) => {
            let injected = match text.rfind("</body>") {
                Some(pos) => {
                    let mut out = String::with_capacity(text.len() + LIVE_RELOAD_SNIPPET.len());
                    out.push_str(&text[..pos]);
                    out.push_str(LIVE_RELOAD_SNIPPET);
                    out.push_str(&text[pos..]);
                    out
                }
                None => text + LIVE_RELOAD_SNIPPET,
            };
            injected.into_bytes()
        }
        Err(e) => e.into_bytes(),
    }
}

async fn write_response(
    write_half: &mut OwnedWriteHalf,
    status: &str,
    mime: &str,
    body: &[u8],
) -> std::io::Result<()> {
    let headers = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {mime}\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        body.len()
    );
    write_half.write_all(headers.as_bytes()).await?;
    write_half.write_all(body).await?;
    write_half.flush().await
}

/// Hold the connection open and forward reload events as SSE messages
async fn stream_events(
    mut write_half: OwnedWriteHalf,
    mut events: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    write_half
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: keep-alive\r\n\r\nretry: 1000\n\n",
        )
        .await?;
    write_half.flush().await?;

    loop {
        match events.recv().await {
            Ok(()) => {
                write_half.write_all(b"event: reload\ndata: {}\n\n").await?;
                write_half.flush().await?;
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    Ok(())
}
