//! Query listener.
//!
//! A minimal HTTP/1.1 endpoint serving snapshots as JSON: `/all`, `/complete` and
//! `/pending` (any other path). Each listener runs on its own detached thread, which
//! never keeps the process alive, and hands every connection to a short-lived thread.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::registry::CallbackRegistry;
use crate::report::ReportMode;
use crate::{InspectorError, Result};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Bind `host:port` and serve `registry` from a background thread.
pub(crate) fn spawn(host: &str, port: u16, registry: Arc<CallbackRegistry>) -> Result<SocketAddr> {
    let bind_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&bind_addr).map_err(|source| InspectorError::Bind {
        addr: bind_addr.clone(),
        source,
    })?;
    let addr = listener.local_addr()?;

    thread::Builder::new()
        .name(format!("cb-inspector-{}", addr.port()))
        .spawn(move || accept_loop(listener, registry))?;

    log::info!("callback inspector serving snapshots on http://{}", addr);
    Ok(addr)
}

fn accept_loop(listener: TcpListener, registry: Arc<CallbackRegistry>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let registry = Arc::clone(&registry);
                // a silent client holds only its own thread
                let spawned = thread::Builder::new()
                    .name("cb-inspector-conn".to_string())
                    .spawn(move || serve_connection(&registry, stream));
                if let Err(err) = spawned {
                    log::warn!("callback inspector could not start connection thread: {}", err);
                }
            }
            Err(err) => log::warn!("callback inspector accept failed: {}", err),
        }
    }
}

fn serve_connection(registry: &CallbackRegistry, mut stream: TcpStream) {
    if let Err(err) = handle_connection(registry, &mut stream) {
        log::warn!("callback inspector query failed: {}", err);
    }
}

fn handle_connection(registry: &CallbackRegistry, stream: &mut TcpStream) -> Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    let head = read_request_head(stream)?;
    if head.is_empty() {
        return Ok(());
    }
    let path = request_path(&head);
    let mode = ReportMode::from_path(path);
    log::debug!("callback inspector query {} -> {}", path, mode);

    let body = serde_json::to_vec(&mode.select(registry))?;
    write_response(stream, &body)?;
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

/// Read until the end of the request head, EOF, or the size limit.
fn read_request_head(stream: &mut TcpStream) -> Result<String> {
    let mut head = Vec::with_capacity(512);
    let mut buf = [0_u8; 512];
    loop {
        let read = stream.read(&mut buf)?;
        if read == 0 {
            break;
        }
        head.extend_from_slice(&buf[..read]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Path of the request line, `/` if it cannot be parsed.
fn request_path(head: &str) -> &str {
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
}

fn write_response(stream: &mut TcpStream, body: &[u8]) -> Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}
