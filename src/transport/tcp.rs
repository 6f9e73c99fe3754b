//! tokio TCP transport with optional rustls.
//!
//! Each connection runs in its own task and reports back over an unbounded
//! channel, the same way the owner's other input sources do. Every report
//! carries the generation of the connection that produced it so stale
//! reports from a closed connection can be told apart.

use super::{ConnectTarget, Transport};
use crate::error::TransportError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Ready {
        generation: u64,
        local_ip: Option<Ipv4Addr>,
    },
    Data {
        generation: u64,
        bytes: Vec<u8>,
    },
    Closed {
        generation: u64,
        error: bool,
    },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Ready { generation, .. }
            | Self::Data { generation, .. }
            | Self::Closed { generation, .. } => *generation,
        }
    }
}

trait IrcStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IrcStream for T {}

pub struct TcpTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    writer: Option<mpsc::UnboundedSender<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
    generation: Arc<AtomicU64>,
}

impl TcpTransport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            writer: None,
            task: None,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generation of the current (or last) connection. The handle stays
    /// valid after the transport is moved into a session.
    pub fn generation(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, target: &ConnectTarget) -> Result<(), TransportError> {
        self.close();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let events = self.events.clone();
        let target = target.clone();

        let task = tokio::spawn(async move {
            let error = match run_connection(&target, generation, &events, write_rx).await {
                Ok(()) => false,
                Err(err) => {
                    warn!(host = %target.host, %err, "connection ended");
                    true
                }
            };
            let _ = events.send(TransportEvent::Closed { generation, error });
        });

        self.writer = Some(write_tx);
        self.task = Some(task);
        Ok(())
    }

    fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let writer = self.writer.as_ref().ok_or(TransportError::NotConnected)?;
        writer
            .send(bytes)
            .map_err(|_| TransportError::Write("connection task is gone".to_string()))
    }

    /// Lines already queued are still written; the task is stopped for
    /// good after a short grace period.
    fn close(&mut self) {
        self.writer = None;
        let Some(task) = self.task.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(CLOSE_GRACE).await;
                    task.abort();
                });
            }
            Err(_) => task.abort(),
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    target: &ConnectTarget,
    generation: u64,
    events: &mpsc::UnboundedSender<TransportEvent>,
    mut write_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) -> anyhow::Result<()> {
    let tcp = TcpStream::connect((target.host.as_str(), target.port)).await?;
    let local_ip = match tcp.local_addr()?.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(ip) => ip.to_ipv4_mapped(),
    };
    let stream: Box<dyn IrcStream> = if target.tls {
        Box::new(upgrade_to_tls(tcp, &target.host, target.accept_invalid_certs).await?)
    } else {
        Box::new(tcp)
    };
    info!(host = %target.host, port = target.port, tls = target.tls, "transport connected");
    let _ = events.send(TransportEvent::Ready { generation, local_ip });

    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0u8; 8192];
    loop {
        tokio::select! {
            read = tokio::time::timeout(target.idle_timeout, reader.read(&mut buf)) => {
                let n = match read {
                    Ok(result) => result?,
                    Err(_) => anyhow::bail!("idle for {:?}", target.idle_timeout),
                };
                if n == 0 {
                    debug!(host = %target.host, "peer closed the connection");
                    return Ok(());
                }
                if events.send(TransportEvent::Data { generation, bytes: buf[..n].to_vec() }).is_err() {
                    return Ok(());
                }
            }
            line = write_rx.recv() => {
                let Some(line) = line else {
                    return Ok(());
                };
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
        }
    }
}

async fn upgrade_to_tls(
    tcp: TcpStream,
    host: &str,
    accept_invalid_certs: bool,
) -> anyhow::Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let config = if accept_invalid_certs {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for cert in native.certs {
            if let Err(err) = roots.add(cert) {
                warn!(%err, "skipping unusable root certificate");
            }
        }
        for err in &native.errors {
            warn!(%err, "error loading native certificates");
        }
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host.to_string())?;
    let stream = connector.connect(server_name, tcp).await?;
    debug!(host, verify = !accept_invalid_certs, "TLS handshake completed");
    Ok(stream)
}

/// Certificate check used for self-signed test networks.
#[derive(Debug)]
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}
