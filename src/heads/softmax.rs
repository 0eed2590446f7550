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

use crate::common::masking::{check_mask, check_rank, masked_softmax};
use crate::heads::SpanLogits;
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # Simple softmax span head
/// Independent linear down-projections of every context position to a start and an end logit,
/// each normalized with a masked softmax over the context.
#[derive(Debug)]
pub struct SoftmaxHead {
    start: nn::Linear,
    end: nn::Linear,
}

impl SoftmaxHead {
    pub fn new<'p, P>(p: P, input_size: i64) -> SoftmaxHead
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let start = nn::linear(p / "start_dist", input_size, 1, Default::default());
        let end = nn::linear(p / "end_dist", input_size, 1, Default::default());
        SoftmaxHead { start, end }
    }

    /// Forward pass through the head
    ///
    /// # Arguments
    ///
    /// * `inputs` - context representation of shape (*batch size*, *context_length*, *input_size*)
    /// * `mask` - context mask of shape (*batch size*, *context_length*)
    ///
    /// # Returns
    ///
    /// * `SpanLogits` with tensors of shape (*batch size*, *context_length*)
    pub fn forward(&self, inputs: &Tensor, mask: &Tensor) -> Result<SpanLogits, RustSquadError> {
        check_rank(inputs, 3, "context representation")?;
        check_mask(inputs, mask, "context representation")?;

        let (start_logits, start_probabilities) =
            masked_softmax(&inputs.apply(&self.start).select(2, 0), mask, 1)?;
        let (end_logits, end_probabilities) =
            masked_softmax(&inputs.apply(&self.end).select(2, 0), mask, 1)?;

        Ok(SpanLogits {
            start_logits,
            start_probabilities,
            end_logits,
            end_probabilities,
        })
    }
}
