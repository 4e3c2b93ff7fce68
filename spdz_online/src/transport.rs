use futures::{
    stream::{SplitSink, SplitStream},
    FutureExt, Sink, SinkExt, Stream, StreamExt, TryFutureExt,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;

/// Error type for channels.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Error while sending message to {0}")]
    Send(usize),
    #[error("Error while receiving message from {0}")]
    Recv(usize),
    #[error("Channel missing for party {0}")]
    MissingChannel(usize),
    #[error("Expected one message per party ({expected}), got {received}")]
    MessageCount { expected: usize, received: usize },
    #[error("Cannot exchange messages with own party")]
    Loopback,
    #[error("No message from party {0} available in this round")]
    MissingMessage(usize),
    #[error("Party {party} sent message for round {received}, expected round {expected}")]
    RoundMismatch {
        party: usize,
        expected: u64,
        received: u64,
    },
}

type Halves<T, Channel> = (SplitSink<Channel, T>, SplitStream<Channel>);

/// Wrapper for peer-to-peer connections in multi-party protocol.
pub struct MultipartyTransport<T, Channel> {
    channels: Vec<Option<Halves<T, Channel>>>,
    party_id: usize,
}

impl<T, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream + Sink<T>,
{
    /// Create wrapper for given list of connections. All channels but party_id should be present.
    pub fn new(
        channels: impl IntoIterator<Item = Option<Channel>>,
        party_id: usize,
    ) -> Result<Self, TransportError> {
        // We split streams into unidirectional halves. This allows us to
        // asynchronously wait on both receives and sends without bothering borrow checker.
        let channels: Vec<_> = channels.into_iter().map(|x| x.map(|x| x.split())).collect();
        for (j, channel) in channels.iter().enumerate() {
            if j != party_id && channel.is_none() {
                return Err(TransportError::MissingChannel(j));
            }
        }
        Ok(Self { channels, party_id })
    }
}

impl<T, Channel> MultipartyTransport<T, Channel> {
    /// Number of parties participating in multi-party protocol.
    pub fn num_parties(&self) -> usize {
        self.channels.len()
    }

    /// ID of current party.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    fn halves(&mut self, other_id: usize) -> Result<&mut Halves<T, Channel>, TransportError> {
        if other_id == self.party_id {
            return Err(TransportError::Loopback);
        }
        self.channels
            .get_mut(other_id)
            .and_then(Option::as_mut)
            .ok_or(TransportError::MissingChannel(other_id))
    }
}

impl<T, E, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    /// Send message to party with given ID.
    pub async fn send_to(&mut self, other_id: usize, msg: T) -> Result<(), TransportError> {
        let (sink, _) = self.halves(other_id)?;
        sink.send(msg)
            .await
            .map_err(|_| TransportError::Send(other_id))
    }

    /// Receive message from party with given ID.
    pub async fn receive_from(&mut self, other_id: usize) -> Result<T, TransportError> {
        let (_, stream) = self.halves(other_id)?;
        match stream.next().await {
            Some(Ok(msg)) => Ok(msg),
            _ => Err(TransportError::Recv(other_id)),
        }
    }

    /// Concurrently send individual messages to all parties and receive one message from each.
    /// `messages` is indexed by party ID; the entry for the current party is dropped.
    pub async fn exchange_each(
        &mut self,
        messages: Vec<T>,
    ) -> Result<Vec<(usize, T)>, TransportError> {
        if messages.len() != self.channels.len() {
            return Err(TransportError::MessageCount {
                expected: self.channels.len(),
                received: messages.len(),
            });
        }
        let party_id = self.party_id;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .zip(messages)
                .enumerate()
                .filter(|(id, _)| *id != party_id)
                .map(|(id, (channel, msg))| async move {
                    let (sink, stream) =
                        channel.as_mut().ok_or(TransportError::MissingChannel(id))?;
                    let send_future = sink
                        .send(msg)
                        .then(move |x| async move { x.map_err(|_| TransportError::Send(id)) });
                    let recv_future = stream.next().then(move |raw| async move {
                        match raw {
                            Some(Ok(msg)) => Ok((id, msg)),
                            _ => Err(TransportError::Recv(id)),
                        }
                    });
                    futures::future::try_join(send_future, recv_future)
                        .and_then(|(_, received_msg)| async { Ok(received_msg) })
                        .await
                }),
        )
        .await
    }
}

/// Length-framed Bincode-encoded messages channel.
pub type BincodeStreamSink<T, C> =
    tokio_serde::Framed<tokio_util::codec::Framed<C, LengthDelimitedCodec>, T, T, Bincode<T, T>>;

/// Length-framed Bincode-encoded tokio's Duplex stream.
pub type BincodeDuplex<T> = BincodeStreamSink<T, DuplexStream>;

/// Create length-framed Bincode-encoded message channel from AsyncRead/Write.
pub fn wrap_bincode<T, C>(channel: C) -> BincodeStreamSink<T, C>
where
    C: AsyncRead + AsyncWrite,
{
    let length_delimited = tokio_util::codec::Framed::new(channel, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(length_delimited, Bincode::default())
}

/// Create bidirectional Bincode-encoded channel.
pub fn bincode_duplex<T>(max_buf_size: usize) -> (BincodeDuplex<T>, BincodeDuplex<T>) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    (wrap_bincode(a), wrap_bincode(b))
}

/// Create in-process channels for testing multiparty protocols.
pub fn mock_multiparty_channels<T>(
    num_parties: usize,
    max_buf_size: usize,
) -> Vec<MultipartyTransport<T, BincodeDuplex<T>>>
where
    T: Serialize + DeserializeOwned + Unpin,
{
    let mut matrix: Vec<Vec<_>> = (0..num_parties)
        .map(|_| (0..num_parties).map(|_| None).collect())
        .collect();

    for i in 0..num_parties {
        for j in 0..i {
            let (a, b) = bincode_duplex::<T>(max_buf_size);
            matrix[i][j] = Some(a);
            matrix[j][i] = Some(b);
        }
    }

    matrix
        .into_iter()
        .enumerate()
        .map(|(id, row)| MultipartyTransport {
            channels: row.into_iter().map(|x| x.map(|x| x.split())).collect(),
            party_id: id,
        })
        .collect()
}
