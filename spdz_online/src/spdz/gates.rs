use tracing::trace;

use crate::{
    error::MpcError,
    fields::{deserialize_list, serialize_list, MpcField},
    network::Network,
    protocols::{Broadcast, EvaluationStatus, NativeProtocol},
};

use super::{OpenedValue, SpdzDealer, SpdzResourcePool, SpdzShare};

/// Sum own value with the values received from every other party.
fn open_values<T: MpcField>(
    own: &[T],
    network: &mut dyn Network,
) -> Result<Vec<T>, MpcError> {
    let mut sums = own.to_vec();
    for (party, payload) in network.receive_from_all()? {
        let values = deserialize_list::<T>(&payload)?;
        if values.len() != sums.len() {
            return Err(MpcError::LengthMismatch {
                len: payload.len(),
                width: T::byte_length() * sums.len(),
            });
        }
        trace!(party, count = values.len(), "Received partial openings");
        for (sum, value) in sums.iter_mut().zip(values) {
            *sum += value;
        }
    }
    Ok(sums)
}

enum InputStage<T> {
    Start { input: Option<T> },
    Broadcast { mask: SpdzShare<T>, broadcast: Broadcast },
    Done(SpdzShare<T>),
}

/// Secret-shares a value known to a single party using a preprocessed input mask.
///
/// The owner broadcasts `x - r` for its mask `r`; the result is `[r] + (x - r)`.
pub struct InputGate<T> {
    owner: usize,
    stage: InputStage<T>,
}

impl<T: MpcField> InputGate<T> {
    /// `input` must be present exactly at the party with ID `owner`.
    pub fn new(owner: usize, input: Option<T>) -> Self {
        Self {
            owner,
            stage: InputStage::Start { input },
        }
    }

    pub fn output(&self) -> Option<SpdzShare<T>> {
        match self.stage {
            InputStage::Done(share) => Some(share),
            _ => None,
        }
    }
}

impl<T, D> NativeProtocol<SpdzResourcePool<T, D>> for InputGate<T>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    fn evaluate(
        &mut self,
        _round: usize,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError> {
        let stage = std::mem::replace(&mut self.stage, InputStage::Done(Default::default()));
        self.stage = match stage {
            InputStage::Start { input } => {
                let is_owner = network.party_id() == self.owner;
                let (mask, payload) = match (is_owner, input) {
                    (true, Some(x)) => {
                        let (mask, plain) = pool.dealer_mut().next_input_mask_own()?;
                        (mask, (x - plain).to_bytes_be())
                    }
                    (false, None) => (
                        pool.dealer_mut().next_input_mask_for(self.owner)?,
                        Vec::new(),
                    ),
                    (true, None) => return Err(MpcError::config("Input owner has no input value")),
                    (false, Some(_)) => {
                        return Err(MpcError::config("Input value given to non-owner party"))
                    }
                };
                let mut broadcast = Broadcast::new(payload, network.num_parties());
                broadcast.step(network)?;
                InputStage::Broadcast { mask, broadcast }
            }
            InputStage::Broadcast {
                mask,
                mut broadcast,
            } => match broadcast.step(network)? {
                Some(values) => {
                    let delta = values
                        .get(self.owner)
                        .ok_or_else(|| MpcError::config("Unknown input owner"))?;
                    let delta = T::from_bytes_be(delta)?;
                    InputStage::Done(mask + pool.dealer().share_plain(delta))
                }
                None => InputStage::Broadcast { mask, broadcast },
            },
            done => done,
        };

        Ok(match self.stage {
            InputStage::Done(_) => EvaluationStatus::Done,
            _ => EvaluationStatus::MoreRoundsNeeded,
        })
    }
}

enum MultStage<T> {
    Start,
    Opening {
        triple: (SpdzShare<T>, SpdzShare<T>, SpdzShare<T>),
        e: SpdzShare<T>,
        d: SpdzShare<T>,
    },
    Done(SpdzShare<T>),
}

/// Multiplication of two shared values with a Beaver triple.
pub struct MultGate<T> {
    x: SpdzShare<T>,
    y: SpdzShare<T>,
    stage: MultStage<T>,
}

impl<T: MpcField> MultGate<T> {
    pub fn new(x: SpdzShare<T>, y: SpdzShare<T>) -> Self {
        Self {
            x,
            y,
            stage: MultStage::Start,
        }
    }

    pub fn output(&self) -> Option<SpdzShare<T>> {
        match self.stage {
            MultStage::Done(share) => Some(share),
            _ => None,
        }
    }
}

impl<T, D> NativeProtocol<SpdzResourcePool<T, D>> for MultGate<T>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    fn evaluate(
        &mut self,
        _round: usize,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError> {
        match self.stage {
            MultStage::Start => {
                let triple = pool.dealer_mut().next_beaver_triple()?;
                let e = self.x - triple.0;
                let d = self.y - triple.1;
                network.send_to_all(&serialize_list(&[e.value, d.value]));
                self.stage = MultStage::Opening { triple, e, d };
                Ok(EvaluationStatus::MoreRoundsNeeded)
            }
            MultStage::Opening {
                triple: (a, b, c),
                e,
                d,
            } => {
                let opened = open_values(&[e.value, d.value], network)?;
                let (e_open, d_open) = (opened[0], opened[1]);
                let store = pool.store_mut();
                store.append(OpenedValue::new(e_open, e));
                store.append(OpenedValue::new(d_open, d));

                let product =
                    c + b * e_open + a * d_open + pool.dealer().share_plain(e_open * d_open);
                self.stage = MultStage::Done(product);
                Ok(EvaluationStatus::Done)
            }
            MultStage::Done(_) => Ok(EvaluationStatus::Done),
        }
    }
}

enum OpenStage<T> {
    Start,
    Opening,
    Done(T),
}

/// Output gate revealing a shared value to all parties.
///
/// The revealed value is unverified until the next MAC check passes.
pub struct OpenGate<T> {
    share: SpdzShare<T>,
    stage: OpenStage<T>,
}

impl<T: MpcField> OpenGate<T> {
    pub fn new(share: SpdzShare<T>) -> Self {
        Self {
            share,
            stage: OpenStage::Start,
        }
    }

    pub fn output(&self) -> Option<T> {
        match self.stage {
            OpenStage::Done(value) => Some(value),
            _ => None,
        }
    }
}

impl<T, D> NativeProtocol<SpdzResourcePool<T, D>> for OpenGate<T>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    fn evaluate(
        &mut self,
        _round: usize,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError> {
        match self.stage {
            OpenStage::Start => {
                network.send_to_all(&self.share.value.to_bytes_be());
                self.stage = OpenStage::Opening;
                Ok(EvaluationStatus::MoreRoundsNeeded)
            }
            OpenStage::Opening => {
                let value = open_values(&[self.share.value], network)?[0];
                pool.store_mut().append(OpenedValue::new(value, self.share));
                self.stage = OpenStage::Done(value);
                Ok(EvaluationStatus::Done)
            }
            OpenStage::Done(_) => Ok(EvaluationStatus::Done),
        }
    }

    fn is_output(&self) -> bool {
        true
    }
}

/// Any SPDZ gate.
pub enum SpdzGate<T> {
    Input(InputGate<T>),
    Mult(MultGate<T>),
    Open(OpenGate<T>),
}

impl<T: MpcField> SpdzGate<T> {
    /// Resulting share of an input or multiplication gate.
    pub fn share(&self) -> Option<SpdzShare<T>> {
        match self {
            SpdzGate::Input(gate) => gate.output(),
            SpdzGate::Mult(gate) => gate.output(),
            SpdzGate::Open(_) => None,
        }
    }

    /// Revealed value of an output gate.
    pub fn opened(&self) -> Option<T> {
        match self {
            SpdzGate::Open(gate) => gate.output(),
            _ => None,
        }
    }
}

impl<T, D> NativeProtocol<SpdzResourcePool<T, D>> for SpdzGate<T>
where
    T: MpcField,
    D: SpdzDealer<Field = T, Share = SpdzShare<T>>,
{
    fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T, D>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus, MpcError> {
        match self {
            SpdzGate::Input(gate) => gate.evaluate(round, pool, network),
            SpdzGate::Mult(gate) => gate.evaluate(round, pool, network),
            SpdzGate::Open(gate) => gate.evaluate(round, pool, network),
        }
    }

    fn is_output(&self) -> bool {
        matches!(self, SpdzGate::Open(_))
    }
}
