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

use crate::attention::AttentionOutput;
use crate::common::dropout::Dropout;
use crate::common::linear::{linear_no_bias, vector_projection, LinearNoBias, VectorProjection};
use crate::common::masking::{check_mask, check_rank, masked_softmax};
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # Self-attention
/// Every position of a sequence attends to all (unpadded) positions of the same sequence.
/// Scores are bilinear in the `tanh` features `g = tanh(W1 x)`: `score(i, j) = (g_i * v) . g_j`.
#[derive(Debug)]
pub struct SelfAttention {
    w1: LinearNoBias,
    v: VectorProjection,
    dropout: Dropout,
    vector_size: i64,
}

impl SelfAttention {
    pub fn new<'p, P>(p: P, vector_size: i64, keep_prob: f64) -> SelfAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        SelfAttention {
            w1: linear_no_bias(p / "W1", vector_size, vector_size),
            v: vector_projection(p, "V", vector_size),
            dropout: Dropout::from_keep_prob(keep_prob),
            vector_size,
        }
    }

    /// Forward pass through the self-attention layer
    ///
    /// # Arguments
    ///
    /// * `values` - `Tensor` of shape (*batch size*, *sequence_length*, *vector_size*)
    /// * `values_mask` - mask of shape (*batch size*, *sequence_length*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `AttentionOutput` with `logits` and `distribution` of shape (*batch size*, *sequence_length*, *sequence_length*)
    ///   and `output` of shape (*batch size*, *sequence_length*, *vector_size*)
    pub fn forward_t(
        &self,
        values: &Tensor,
        values_mask: &Tensor,
        train: bool,
    ) -> Result<AttentionOutput, RustSquadError> {
        check_rank(values, 3, "self-attention values")?;
        check_mask(values, values_mask, "self-attention values")?;
        if values.size()[2] != self.vector_size {
            return Err(RustSquadError::ShapeMismatch(format!(
                "self-attention expects vectors of width {}, got {}",
                self.vector_size,
                values.size()[2]
            )));
        }

        let features = values.apply(&self.w1).tanh();
        let logits = (&features * &self.v.ws).matmul(&features.transpose(1, 2));
        let (logits, distribution) = masked_softmax(&logits, &values_mask.unsqueeze(1), 2)?;
        let output = distribution.matmul(values).apply_t(&self.dropout, train);

        Ok(AttentionOutput {
            logits,
            distribution,
            output,
        })
    }
}
