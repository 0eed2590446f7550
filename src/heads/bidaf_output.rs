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

use crate::common::linear::{vector_projection, VectorProjection};
use crate::common::masking::{check_mask, check_rank, masked_softmax};
use crate::heads::SpanLogits;
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # BiDAF output layer
/// `start = softmax([G; M] . w1)` and `end = softmax([G; M2] . w2)`, where `G` is the attention
/// output, `M` the modeling layer output and `M2` a further encoding of `M`.
#[derive(Debug)]
pub struct BiDafOutputHead {
    w1: VectorProjection,
    w2: VectorProjection,
    input_size: i64,
}

impl BiDafOutputHead {
    /// Build a new `BiDafOutputHead`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the head
    /// * `attention_size` - width of the attention output `G`
    /// * `modeling_size` - width of the modeling outputs `M` and `M2`
    pub fn new<'p, P>(p: P, attention_size: i64, modeling_size: i64) -> BiDafOutputHead
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let input_size = attention_size + modeling_size;
        BiDafOutputHead {
            w1: vector_projection(p, "w1", input_size),
            w2: vector_projection(p, "w2", input_size),
            input_size,
        }
    }

    /// Forward pass through the head
    ///
    /// # Arguments
    ///
    /// * `attention_output` - `G`, shape (*batch size*, *context_length*, *attention_size*)
    /// * `modeling_output` - `M`, shape (*batch size*, *context_length*, *modeling_size*)
    /// * `end_modeling_output` - `M2`, shape (*batch size*, *context_length*, *modeling_size*)
    /// * `mask` - context mask of shape (*batch size*, *context_length*)
    ///
    /// # Returns
    ///
    /// * `SpanLogits` with tensors of shape (*batch size*, *context_length*)
    pub fn forward(
        &self,
        attention_output: &Tensor,
        modeling_output: &Tensor,
        end_modeling_output: &Tensor,
        mask: &Tensor,
    ) -> Result<SpanLogits, RustSquadError> {
        for (tensor, name) in &[
            (attention_output, "attention output"),
            (modeling_output, "modeling output"),
            (end_modeling_output, "end modeling output"),
        ] {
            check_rank(tensor, 3, name)?;
            check_mask(tensor, mask, name)?;
        }

        let start_inputs = Tensor::cat(&[attention_output, modeling_output], 2);
        let end_inputs = Tensor::cat(&[attention_output, end_modeling_output], 2);
        for inputs in &[&start_inputs, &end_inputs] {
            if inputs.size()[2] != self.input_size {
                return Err(RustSquadError::ShapeMismatch(format!(
                    "BiDAF output expects concatenated inputs of width {}, got {}",
                    self.input_size,
                    inputs.size()[2]
                )));
            }
        }

        let (start_logits, start_probabilities) =
            masked_softmax(&start_inputs.apply(&self.w1), mask, 1)?;
        let (end_logits, end_probabilities) = masked_softmax(&end_inputs.apply(&self.w2), mask, 1)?;

        Ok(SpanLogits {
            start_logits,
            start_probabilities,
            end_logits,
            end_probabilities,
        })
    }
}
