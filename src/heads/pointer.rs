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

use crate::attention::{AttentionOutput, BasicAttention};
use crate::common::dropout::Dropout;
use crate::common::masking::{check_mask, check_rank};
use crate::encoder::unroll_gru;
use crate::heads::SpanLogits;
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::nn::{GRUState, RNN};
use tch::{nn, Tensor};

/// # Answer pointer head
/// Sequential span prediction ([Wang & Jiang, 2016](https://arxiv.org/abs/1608.07905)):
/// 1. a GRU reads the context, its final state attends over the context to point at the start
/// 2. the attended context vector is fed back into the same GRU, whose new state attends over the
///    context to point at the end
///
/// The end distribution is therefore conditioned on the outcome of the start step.
#[derive(Debug)]
pub struct AnswerPointerHead {
    cell: nn::GRU,
    attention: BasicAttention,
    dropout: Dropout,
    hidden_size: i64,
}

impl AnswerPointerHead {
    /// Build a new `AnswerPointerHead`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the head
    /// * `hidden_size` - width of the context representation and of the GRU state
    /// * `keep_prob` - keep probability for the dropout layers
    pub fn new<'p, P>(p: P, hidden_size: i64, keep_prob: f64) -> AnswerPointerHead
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let cell = nn::gru(&(p / "cell"), hidden_size, hidden_size, Default::default());
        AnswerPointerHead {
            cell,
            attention: BasicAttention::new(keep_prob),
            dropout: Dropout::from_keep_prob(keep_prob),
            hidden_size,
        }
    }

    /// Forward pass through the head
    ///
    /// # Arguments
    ///
    /// * `inputs` - context representation of shape (*batch size*, *context_length*, *hidden_size*)
    /// * `mask` - context mask of shape (*batch size*, *context_length*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `SpanLogits` with tensors of shape (*batch size*, *context_length*)
    pub fn forward_t(
        &self,
        inputs: &Tensor,
        mask: &Tensor,
        train: bool,
    ) -> Result<SpanLogits, RustSquadError> {
        self.check_inputs(inputs, mask)?;

        let (_, start_state) =
            unroll_gru(&self.cell, &inputs.apply_t(&self.dropout, train), mask, false)?;
        let start = self.point(inputs, mask, &start_state, train)?;
        let end = self.point_end(inputs, mask, &start_state, &start.output, train)?;

        Ok(SpanLogits {
            start_logits: start.logits.select(1, 0),
            start_probabilities: start.distribution.select(1, 0),
            end_logits: end.logits.select(1, 0),
            end_probabilities: end.distribution.select(1, 0),
        })
    }

    /// Second pointer step: advances the GRU with the attended vector of the start step and
    /// attends over the context with the new state.
    ///
    /// # Arguments
    ///
    /// * `inputs` - context representation of shape (*batch size*, *context_length*, *hidden_size*)
    /// * `mask` - context mask of shape (*batch size*, *context_length*)
    /// * `start_state` - GRU state used for the start step, shape (*batch size*, *hidden_size*)
    /// * `start_attended` - attention output of the start step, shape (*batch size*, 1, *hidden_size*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `AttentionOutput` over the context for the end position, `logits` and `distribution` of
    ///   shape (*batch size*, 1, *context_length*)
    pub fn point_end(
        &self,
        inputs: &Tensor,
        mask: &Tensor,
        start_state: &Tensor,
        start_attended: &Tensor,
        train: bool,
    ) -> Result<AttentionOutput, RustSquadError> {
        self.check_inputs(inputs, mask)?;
        check_rank(start_attended, 3, "start attention output")?;

        let step_input = start_attended.select(1, 0).apply_t(&self.dropout, train);
        let GRUState(end_state) = self.cell.step(&step_input, &GRUState(start_state.unsqueeze(0)));
        self.point(inputs, mask, &end_state.select(0, 0), train)
    }

    fn point(
        &self,
        inputs: &Tensor,
        mask: &Tensor,
        state: &Tensor,
        train: bool,
    ) -> Result<AttentionOutput, RustSquadError> {
        self.attention.forward_t(&state.unsqueeze(1), inputs, mask, train)
    }

    fn check_inputs(&self, inputs: &Tensor, mask: &Tensor) -> Result<(), RustSquadError> {
        check_rank(inputs, 3, "context representation")?;
        check_mask(inputs, mask, "context representation")?;
        if inputs.size()[2] != self.hidden_size {
            return Err(RustSquadError::ShapeMismatch(format!(
                "answer pointer expects a context representation of width {}, got {}",
                self.hidden_size,
                inputs.size()[2]
            )));
        }
        Ok(())
    }
}
