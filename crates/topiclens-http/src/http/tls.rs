//! TLS termination for the API listener.

use log::{debug, warn};
use rustls::ServerConfig;
use std::fs::File;
use std::io::{self, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

type Handshaken = Option<(TlsStream<TcpStream>, SocketAddr)>;

/// Accepts TCP connections and completes the TLS handshake before handing them to axum.
///
/// Handshakes run in their own tasks, each bounded by `handshake_timeout`, so a
/// peer that never sends a ClientHello holds up nobody but itself.
pub struct TlsListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    handshake_timeout: Duration,
    handshakes: JoinSet<Handshaken>,
}

impl TlsListener {
    pub fn bind(
        listener: TcpListener,
        cert_file: &Path,
        key_file: &Path,
        handshake_timeout: Duration,
    ) -> io::Result<Self> {
        let config = load_server_config(cert_file, key_file)?;
        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(Arc::new(config)),
            handshake_timeout,
            handshakes: JoinSet::new(),
        })
    }
}

async fn handshake(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    addr: SocketAddr,
    timeout: Duration,
) -> Handshaken {
    match tokio::time::timeout(timeout, acceptor.accept(stream)).await {
        Ok(Ok(tls)) => Some((tls, addr)),
        Ok(Err(e)) => {
            debug!("TLS handshake with {addr} failed: {e}");
            None
        }
        Err(_) => {
            debug!("TLS handshake with {addr} timed out after {timeout:?}");
            None
        }
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

pub fn load_server_config(cert_file: &Path, key_file: &Path) -> io::Result<ServerConfig> {
    let mut cert_reader = BufReader::new(File::open(cert_file)?);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(invalid_data(format!(
            "no certificates found in {}",
            cert_file.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_file)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| invalid_data(format!("no private key found in {}", key_file.display())))?;

    ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| invalid_data(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| invalid_data(e.to_string()))
}

impl axum::serve::Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        self.handshakes.spawn(handshake(
                            self.acceptor.clone(),
                            stream,
                            addr,
                            self.handshake_timeout,
                        ));
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {e}");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(done) = self.handshakes.join_next(), if !self.handshakes.is_empty() => {
                    match done {
                        Ok(Some(connection)) => return connection,
                        Ok(None) => {}
                        Err(e) => warn!("TLS handshake task failed: {e}"),
                    }
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.listener.local_addr()
    }
}
