//! Party façade over the transport.
//!
//! Higher layers talk to a [Party] and never learn whether their side is the
//! listener or the connector. Every exchange is a symmetric `send_recv`: the
//! caller submits its own outgoing words and receives the peer's. Internally
//! party 0 sends first and then receives, party 1 does the reverse, so
//! neither side can deadlock on a full send buffer.
pub mod error;

use std::io::{self, ErrorKind};
use std::time::Duration;

use log::debug;

use crate::network::{CommChannel, CommInfo, Endpoint};

use self::error::{MpcError, MpcResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default)]
pub struct CommStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub rounds: usize,
}

pub struct Party {
    id: usize,
    comm: CommInfo,
    endpoint: Option<Endpoint>,
    started: bool,
    stats: Option<CommStats>,
}

impl Party {
    pub fn new(comm: CommInfo) -> MpcResult<Self> {
        if comm.party_id > 1 {
            return Err(MpcError::InvalidParameter(format!(
                "party id must be 0 or 1, got {}",
                comm.party_id
            )));
        }
        Ok(Self {
            id: comm.party_id,
            comm,
            endpoint: None,
            started: false,
            stats: None,
        })
    }

    /// Like [Party::new] but party 0 binds its listening socket immediately,
    /// so the chosen port is known before `start` blocks in the accept.
    pub fn bind(comm: CommInfo) -> MpcResult<Self> {
        let mut party = Self::new(comm)?;
        if party.id == 0 {
            party.endpoint = Some(Endpoint::bind(party.comm.port)?);
        }
        Ok(party)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Port of the listening socket (party 0 after [Party::bind] or `start`).
    pub fn port(&self) -> Option<u16> {
        self.endpoint.as_ref().and_then(Endpoint::local_port)
    }

    /// Establishes the role-specific connection and resets the traffic
    /// counters. Blocks until the peer is reachable. Calling `start` on a
    /// started party is a no-op.
    pub fn start(&mut self) -> MpcResult<()> {
        if self.started {
            return Ok(());
        }
        let endpoint = match self.endpoint.take() {
            Some(endpoint) => endpoint.accept()?,
            None => match self.id {
                0 => Endpoint::bind(self.comm.port)?.accept()?,
                _ => Endpoint::connect(self.comm.host, self.comm.port, Some(CONNECT_TIMEOUT))?,
            },
        };
        self.endpoint = Some(endpoint);
        self.started = true;
        self.clear_total_bytes_sent();
        debug!("party {} started", self.id);
        Ok(())
    }

    /// Closes the peer connection and, for party 0, the listening socket.
    /// The final traffic counters stay readable afterwards. Idempotent.
    pub fn end(&mut self) -> MpcResult<()> {
        if let Some(endpoint) = self.endpoint.take() {
            if let Some(channel) = endpoint.channel() {
                self.stats = Some(Self::snapshot(channel));
            }
            debug!("party {} closed its endpoint", self.id);
        }
        Ok(())
    }

    fn snapshot(channel: &CommChannel) -> CommStats {
        CommStats {
            bytes_sent: channel.get_bytes_sent(),
            bytes_received: channel.get_bytes_received(),
            rounds: channel.get_rounds(),
        }
    }

    fn channel_mut(&mut self) -> MpcResult<&mut CommChannel> {
        self.endpoint
            .as_mut()
            .ok_or_else(|| {
                MpcError::TransportFailure(io::Error::new(
                    ErrorKind::NotConnected,
                    "communication has not been started",
                ))
            })?
            .channel_mut()
    }

    /// Exchanges one word with the peer.
    pub fn send_recv(&mut self, own: u32) -> MpcResult<u32> {
        let peer = self.send_recv_array(&[own])?;
        Ok(peer[0])
    }

    /// Exchanges a fixed-length block of words with the peer.
    pub fn send_recv_array<const N: usize>(&mut self, own: &[u32; N]) -> MpcResult<[u32; N]> {
        let id = self.id;
        let channel = self.channel_mut()?;
        let mut peer = [0u32; N];
        if id == 0 {
            channel.send_words(own)?;
            channel.recv_words(&mut peer)?;
        } else {
            channel.recv_words(&mut peer)?;
            channel.send_words(own)?;
        }
        Ok(peer)
    }

    /// Exchanges a vector of words with the peer. The wire carries no length
    /// prefix; both parties must size their buffers identically out of band,
    /// and the local own/peer slots must agree.
    pub fn send_recv_vec(&mut self, own: &[u32], peer: &mut [u32]) -> MpcResult<()> {
        if own.len() != peer.len() {
            return Err(MpcError::ProtocolDesync(format!(
                "own buffer holds {} words but the peer slot {}",
                own.len(),
                peer.len()
            )));
        }
        let id = self.id;
        let channel = self.channel_mut()?;
        if id == 0 {
            channel.send_words(own)?;
            channel.recv_words(peer)?;
        } else {
            channel.recv_words(peer)?;
            channel.send_words(own)?;
        }
        Ok(())
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.comm_stats().bytes_sent
    }

    pub fn clear_total_bytes_sent(&mut self) {
        if let Some(endpoint) = self.endpoint.as_mut() {
            if let Ok(channel) = endpoint.channel_mut() {
                channel.reset_counters();
            }
        }
        self.stats = None;
    }

    /// Live counters while connected, the teardown snapshot after [Party::end].
    pub fn comm_stats(&self) -> CommStats {
        self.endpoint
            .as_ref()
            .and_then(Endpoint::channel)
            .map(Self::snapshot)
            .or(self.stats)
            .unwrap_or_default()
    }
}
