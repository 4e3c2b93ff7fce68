//! Round-scoped messaging used by gates.
//!
//! Gates queue outbound payloads with [`Network::send`] and read payloads delivered by the
//! previous flush with [`Network::receive`]. The evaluator calls [`BatchNetwork::flush`] exactly
//! once per round, which acts as a barrier between all parties.

use std::collections::VecDeque;
use std::mem;

use async_trait::async_trait;
use futures::{Sink, Stream};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    error::MpcError,
    transport::{BincodeDuplex, MultipartyTransport, TransportError},
};

/// Per-round point-to-point messaging between parties.
pub trait Network {
    /// ID of current party.
    fn party_id(&self) -> usize;

    /// Number of parties participating in the computation.
    fn num_parties(&self) -> usize;

    /// Queue payload for delivery to `party` at the end of the current round.
    fn send(&mut self, party: usize, payload: Vec<u8>);

    /// Take next payload received from `party` during the previous round.
    fn receive(&mut self, party: usize) -> Result<Vec<u8>, MpcError>;

    /// Queue the same payload for every other party.
    fn send_to_all(&mut self, payload: &[u8]) {
        for party in 0..self.num_parties() {
            if party != self.party_id() {
                self.send(party, payload.to_vec());
            }
        }
    }

    /// Take next payload from every other party, ordered by party ID.
    fn receive_from_all(&mut self) -> Result<Vec<(usize, Vec<u8>)>, MpcError> {
        let me = self.party_id();
        (0..self.num_parties())
            .filter(|&party| party != me)
            .map(|party| Ok((party, self.receive(party)?)))
            .collect()
    }
}

/// Network that can deliver all messages queued during a round.
#[async_trait(?Send)]
pub trait BatchNetwork: Network {
    /// Deliver every queued message and wait for all messages addressed to this party.
    async fn flush(&mut self) -> Result<(), MpcError>;
}

/// Bundle of all payloads one party sends to another within a single round.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoundMessage {
    pub round: u64,
    pub payloads: Vec<Vec<u8>>,
}

/// In-process network over bincode duplex channels.
pub type LocalNetwork = RoundNetwork<BincodeDuplex<RoundMessage>>;

/// [`BatchNetwork`] on top of [`MultipartyTransport`].
///
/// Every flush sends exactly one [`RoundMessage`] to each peer, even if it is empty, so all
/// parties advance rounds in lock-step.
pub struct RoundNetwork<Channel> {
    transport: MultipartyTransport<RoundMessage, Channel>,
    outbound: Vec<Vec<Vec<u8>>>,
    inbound: Vec<VecDeque<Vec<u8>>>,
    round: u64,
}

impl<Channel> RoundNetwork<Channel> {
    /// Wrap connected transport.
    pub fn new(transport: MultipartyTransport<RoundMessage, Channel>) -> Self {
        let num_parties = transport.num_parties();
        Self {
            transport,
            outbound: vec![Vec::new(); num_parties],
            inbound: vec![VecDeque::new(); num_parties],
            round: 0,
        }
    }

    /// Number of flushes performed so far.
    pub fn rounds(&self) -> u64 {
        self.round
    }
}

impl<Channel> Network for RoundNetwork<Channel> {
    fn party_id(&self) -> usize {
        self.transport.party_id()
    }

    fn num_parties(&self) -> usize {
        self.transport.num_parties()
    }

    fn send(&mut self, party: usize, payload: Vec<u8>) {
        self.outbound[party].push(payload);
    }

    fn receive(&mut self, party: usize) -> Result<Vec<u8>, MpcError> {
        self.inbound
            .get_mut(party)
            .and_then(VecDeque::pop_front)
            .ok_or(MpcError::Network(TransportError::MissingMessage(party)))
    }
}

#[async_trait(?Send)]
impl<E, Channel> BatchNetwork for RoundNetwork<Channel>
where
    Channel: Stream<Item = Result<RoundMessage, E>> + Sink<RoundMessage> + Unpin,
{
    async fn flush(&mut self) -> Result<(), MpcError> {
        for (party, queue) in self.inbound.iter_mut().enumerate() {
            if !queue.is_empty() {
                warn!(party, pending = queue.len(), "Dropping unconsumed messages");
                queue.clear();
            }
        }

        let num_parties = self.outbound.len();
        let round = self.round;
        let messages = mem::replace(&mut self.outbound, vec![Vec::new(); num_parties])
            .into_iter()
            .map(|payloads| RoundMessage { round, payloads })
            .collect();

        for (party, msg) in self.transport.exchange_each(messages).await? {
            if msg.round != round {
                return Err(TransportError::RoundMismatch {
                    party,
                    expected: round,
                    received: msg.round,
                }
                .into());
            }
            trace!(round, party, payloads = msg.payloads.len(), "Received round message");
            self.inbound[party].extend(msg.payloads);
        }

        self.round += 1;
        Ok(())
    }
}

/// Connect `num_parties` in-process networks with each other.
pub fn mock_networks(num_parties: usize) -> Vec<LocalNetwork> {
    crate::transport::mock_multiparty_channels(num_parties, 1 << 20)
        .into_iter()
        .map(RoundNetwork::new)
        .collect()
}
