//! Blocking two-endpoint TCP transport.
//!
//! Party 0 listens and accepts exactly one peer; party 1 connects. All
//! exchanges move whole buffers: a send or receive either transfers every
//! requested byte or fails, there is no partial delivery surfaced to callers.
use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use serde::Deserialize;

use crate::party::error::{MpcError, MpcResult};

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Connection parameters of one protocol session.
#[derive(Debug, Clone)]
pub struct CommInfo {
    pub party_id: usize,
    pub host: Ipv4Addr,
    pub port: u16,
}

impl CommInfo {
    pub fn new(party_id: usize, host: Ipv4Addr, port: u16) -> Self {
        Self {
            party_id,
            host,
            port,
        }
    }
}

#[derive(Deserialize)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Config {
    pub fn from_file(path: &Path) -> MpcResult<Self> {
        let file_content = fs::read_to_string(path)?;
        toml::from_str(&file_content).map_err(|ser| MpcError::ParseError(format!("{}", ser)))
    }
}

/// One connected stream plus its traffic counters.
pub struct CommChannel {
    stream: Option<TcpStream>,
    bytes_sent: u64,
    bytes_received: u64,
    rounds: usize,
}

impl CommChannel {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
            bytes_sent: 0,
            bytes_received: 0,
            rounds: 0,
        }
    }

    fn stream_mut(&mut self) -> MpcResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            MpcError::TransportFailure(io::Error::new(
                ErrorKind::NotConnected,
                "connection was closed",
            ))
        })
    }

    /// Writes the whole buffer or fails.
    pub fn write_block(&mut self, bytes: &[u8]) -> MpcResult<()> {
        self.stream_mut()?
            .write_all(bytes)
            .map_err(MpcError::TransportFailure)?;
        self.bytes_sent += bytes.len() as u64;
        self.rounds += 1;
        trace!("sent {} bytes", bytes.len());
        Ok(())
    }

    /// Fills the whole buffer or fails. A peer that closes the stream
    /// mid-read surfaces as a transport failure, not a short read.
    pub fn read_block(&mut self, buffer: &mut [u8]) -> MpcResult<()> {
        self.stream_mut()?
            .read_exact(buffer)
            .map_err(MpcError::TransportFailure)?;
        self.bytes_received += buffer.len() as u64;
        self.rounds += 1;
        trace!("received {} bytes", buffer.len());
        Ok(())
    }

    /// Serializes the words explicitly little-endian, 4 bytes each.
    pub fn send_words(&mut self, words: &[u32]) -> MpcResult<()> {
        let mut buf = Vec::with_capacity(4 * words.len());
        for w in words {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        self.write_block(&buf)
    }

    pub fn recv_words(&mut self, words: &mut [u32]) -> MpcResult<()> {
        let mut buf = vec![0u8; 4 * words.len()];
        self.read_block(&mut buf)?;
        for (w, chunk) in words.iter_mut().zip(buf.chunks_exact(4)) {
            *w = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    pub fn get_bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn get_bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn get_rounds(&self) -> usize {
        self.rounds
    }

    pub fn reset_counters(&mut self) {
        self.bytes_sent = 0;
        self.bytes_received = 0;
        self.rounds = 0;
    }

    pub fn teardown(&mut self) {
        self.stream = None // drop the connection; this will close the socket
    }
}

/// Role-specific endpoint keyed by party id. The unused role cannot be
/// constructed, so a listener can never be asked to connect and vice versa.
pub enum Endpoint {
    /// Party 0 after bind+listen, before the peer has connected.
    Bound(TcpListener),
    /// Party 0 with an accepted peer connection.
    Listener {
        socket: TcpListener,
        channel: CommChannel,
    },
    /// Party 1 with an outbound connection.
    Connector { channel: CommChannel },
}

impl Endpoint {
    /// Binds all interfaces and starts listening; the peer is accepted later.
    pub fn bind(port: u16) -> MpcResult<Self> {
        let listener =
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(MpcError::TransportFailure)?;
        debug!("listening on port {}", port);
        Ok(Endpoint::Bound(listener))
    }

    /// Blocks until exactly one peer has connected. No-op when already
    /// connected.
    pub fn accept(self) -> MpcResult<Self> {
        match self {
            Endpoint::Bound(socket) => {
                let (stream, peer_addr) = socket.accept().map_err(MpcError::TransportFailure)?;
                debug!("peer connected from {}", peer_addr);
                Ok(Endpoint::Listener {
                    socket,
                    channel: CommChannel::new(stream),
                })
            }
            other => Ok(other),
        }
    }

    /// Connects to the listening party, retrying while the peer is not up yet
    /// (if `timeout` is `None`, retries forever).
    pub fn connect(host: Ipv4Addr, port: u16, timeout: Option<Duration>) -> MpcResult<Self> {
        let start_time = Instant::now();
        let stream = loop {
            match TcpStream::connect((host, port)) {
                Ok(stream) => break stream,
                Err(io_err) => {
                    if io_err.kind() != ErrorKind::ConnectionRefused {
                        return Err(MpcError::TransportFailure(io_err));
                    }
                }
            }
            if let Some(timeout) = timeout {
                if start_time.elapsed() >= timeout {
                    return Err(MpcError::TransportFailure(io::Error::new(
                        ErrorKind::NotConnected,
                        format!(
                            "cannot connect to {}:{} after {}s",
                            host,
                            port,
                            timeout.as_secs_f32()
                        ),
                    )));
                }
            }
            thread::sleep(Duration::from_millis(100));
        };
        debug!("connected to {}:{}", host, port);
        Ok(Endpoint::Connector {
            channel: CommChannel::new(stream),
        })
    }

    pub fn local_port(&self) -> Option<u16> {
        match self {
            Endpoint::Bound(socket) | Endpoint::Listener { socket, .. } => {
                socket.local_addr().ok().map(|addr| addr.port())
            }
            Endpoint::Connector { .. } => None,
        }
    }

    pub fn channel(&self) -> Option<&CommChannel> {
        match self {
            Endpoint::Listener { channel, .. } | Endpoint::Connector { channel } => Some(channel),
            Endpoint::Bound(_) => None,
        }
    }

    pub fn channel_mut(&mut self) -> MpcResult<&mut CommChannel> {
        match self {
            Endpoint::Listener { channel, .. } | Endpoint::Connector { channel } => Ok(channel),
            Endpoint::Bound(_) => Err(MpcError::TransportFailure(io::Error::new(
                ErrorKind::NotConnected,
                "no peer has connected yet",
            ))),
        }
    }
}
