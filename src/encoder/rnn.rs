// Copyright 2021 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::common::dropout::Dropout;
use crate::common::masking::{check_mask, check_rank};
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::nn::{GRUState, RNN};
use tch::{nn, Tensor};

/// # Bidirectional GRU sequence encoder
/// Encodes a padded sequence into the concatenation of a forward and a backward GRU hidden state
/// for every position. Padded positions (mask 0) neither update the recurrent state nor produce
/// an output (their hidden states are zero).
///
/// Calling the same instance on several inputs (e.g. context and question) shares its weights.
/// Separate instances built under different paths have independent weights.
#[derive(Debug)]
pub struct SequenceEncoder {
    forward_cell: nn::GRU,
    backward_cell: nn::GRU,
    dropout: Dropout,
    input_size: i64,
    hidden_size: i64,
}

impl SequenceEncoder {
    /// Build a new `SequenceEncoder`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path owning the encoder weights (acts as the encoder tag)
    /// * `input_size` - width of the input features
    /// * `hidden_size` - hidden size of each direction
    /// * `keep_prob` - keep probability for the input and output dropout
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_squad::encoder::SequenceEncoder;
    /// use tch::{nn, Device};
    ///
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let encoder = SequenceEncoder::new(&vs.root() / "context_encoder", 100, 200, 0.8);
    /// ```
    pub fn new<'p, P>(p: P, input_size: i64, hidden_size: i64, keep_prob: f64) -> SequenceEncoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let forward_cell = nn::gru(&(p / "fw"), input_size, hidden_size, Default::default());
        let backward_cell = nn::gru(&(p / "bw"), input_size, hidden_size, Default::default());
        SequenceEncoder {
            forward_cell,
            backward_cell,
            dropout: Dropout::from_keep_prob(keep_prob),
            input_size,
            hidden_size,
        }
    }

    /// Width of the encoded representation (`2 * hidden_size`)
    pub fn output_size(&self) -> i64 {
        2 * self.hidden_size
    }

    /// Forward pass through the encoder
    ///
    /// # Arguments
    ///
    /// * `inputs` - input sequence of shape (*batch size*, *sequence_length*, *input_size*)
    /// * `mask` - mask of shape (*batch size*, *sequence_length*), 1 for real tokens and 0 for padding
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *sequence_length*, *2 x hidden_size*)
    pub fn forward_t(
        &self,
        inputs: &Tensor,
        mask: &Tensor,
        train: bool,
    ) -> Result<Tensor, RustSquadError> {
        check_rank(inputs, 3, "encoder inputs")?;
        check_mask(inputs, mask, "encoder inputs")?;
        let input_size = inputs.size()[2];
        if input_size != self.input_size {
            return Err(RustSquadError::ShapeMismatch(format!(
                "encoder expects inputs of width {}, got {}",
                self.input_size, input_size
            )));
        }

        let (forward_states, _) = unroll_gru(
            &self.forward_cell,
            &inputs.apply_t(&self.dropout, train),
            mask,
            false,
        )?;
        let (backward_states, _) = unroll_gru(
            &self.backward_cell,
            &inputs.apply_t(&self.dropout, train),
            mask,
            true,
        )?;

        Ok(Tensor::cat(&[forward_states, backward_states], 2).apply_t(&self.dropout, train))
    }
}

/// Runs a GRU cell step by step over (batch, time, features) inputs, skipping padded positions.
///
/// Returns the per-position hidden states (batch, time, hidden) and the final state
/// (batch, hidden). With `reverse`, the sequence is consumed from its last real token to its first
/// one; padding is expected at the end of each row.
pub(crate) fn unroll_gru(
    cell: &nn::GRU,
    inputs: &Tensor,
    mask: &Tensor,
    reverse: bool,
) -> Result<(Tensor, Tensor), RustSquadError> {
    let (batch_size, sequence_length, _) = inputs.size3()?;
    if sequence_length == 0 {
        return Err(RustSquadError::ShapeMismatch(
            "cannot encode an empty sequence".into(),
        ));
    }
    let mask = mask.to_kind(inputs.kind());

    let mut state = cell.zero_state(batch_size);
    let mut outputs = Vec::with_capacity(sequence_length as usize);
    let positions: Vec<i64> = if reverse {
        (0..sequence_length).rev().collect()
    } else {
        (0..sequence_length).collect()
    };
    for position in positions {
        let step_mask = mask.select(1, position).unsqueeze(-1);
        let carry_mask = step_mask.ones_like() - &step_mask;
        let GRUState(candidate) = cell.step(&inputs.select(1, position), &state);
        let GRUState(previous) = state;
        outputs.push(candidate.select(0, 0) * &step_mask);
        state = GRUState(candidate * &step_mask + previous * carry_mask);
    }
    if reverse {
        outputs.reverse();
    }

    let GRUState(final_state) = state;
    Ok((Tensor::stack(&outputs, 1), final_state.select(0, 0)))
}
