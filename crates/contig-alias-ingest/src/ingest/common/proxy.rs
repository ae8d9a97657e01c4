// HTTP CONNECT tunnelling for FTP control and passive data connections

use crate::config::ProxyConfig;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Open a TCP stream to `target` (`host:port`) through an HTTP proxy
pub fn open_tunnel(proxy: &ProxyConfig, target: &str, timeout: Duration) -> io::Result<TcpStream> {
    let address = proxy
        .address()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("proxy {} did not resolve", proxy.address()),
            )
        })?;

    debug!(proxy = %address, target, "Opening CONNECT tunnel");
    let mut stream = TcpStream::connect_timeout(&address, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    write!(
        stream,
        "CONNECT {target} HTTP/1.1\r\nHost: {target}\r\nProxy-Connection: Keep-Alive\r\n\r\n"
    )?;
    stream.flush()?;

    let status = read_response_head(&mut stream)?;
    if !is_success(&status) {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("proxy refused tunnel to {target}: {status}"),
        ));
    }

    Ok(stream)
}

/// Read the proxy's response head without consuming bytes past it
fn read_response_head(stream: &mut TcpStream) -> io::Result<String> {
    // One byte at a time: anything after the blank line belongs to the FTP server
    let mut reader = BufReader::with_capacity(1, Read::by_ref(stream));
    let mut status = String::new();
    let mut consumed = 0;

    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "proxy closed the connection during CONNECT",
            ));
        }
        consumed += read;
        if consumed > MAX_RESPONSE_HEAD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "proxy response head too large",
            ));
        }

        if status.is_empty() {
            status = line.trim_end().to_string();
        } else if line == "\r\n" || line == "\n" {
            return Ok(status);
        }
    }
}

fn is_success(status_line: &str) -> bool {
    let mut parts = status_line.split_whitespace();
    matches!(
        (parts.next(), parts.next()),
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") && code.starts_with('2')
    )
}
