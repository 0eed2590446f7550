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
use crate::common::masking::{check_mask, check_same_batch_and_width, masked_softmax};
use crate::RustSquadError;
use tch::Tensor;

/// # Dot-product attention
/// Keys attend to values: for every key, a distribution over the (unpadded) values and the
/// corresponding weighted sum of the values. Holds no parameters.
#[derive(Debug)]
pub struct BasicAttention {
    dropout: Dropout,
}

impl BasicAttention {
    pub fn new(keep_prob: f64) -> BasicAttention {
        BasicAttention {
            dropout: Dropout::from_keep_prob(keep_prob),
        }
    }

    /// Forward pass through the attention layer
    ///
    /// # Arguments
    ///
    /// * `keys` - `Tensor` of shape (*batch size*, *num_keys*, *vector_size*)
    /// * `values` - `Tensor` of shape (*batch size*, *num_values*, *vector_size*)
    /// * `values_mask` - mask of shape (*batch size*, *num_values*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `AttentionOutput` with `logits` and `distribution` of shape (*batch size*, *num_keys*, *num_values*)
    ///   and `output` of shape (*batch size*, *num_keys*, *vector_size*)
    pub fn forward_t(
        &self,
        keys: &Tensor,
        values: &Tensor,
        values_mask: &Tensor,
        train: bool,
    ) -> Result<AttentionOutput, RustSquadError> {
        check_same_batch_and_width(keys, values, ("keys", "values"))?;
        check_mask(values, values_mask, "values")?;

        let logits = keys.matmul(&values.transpose(1, 2));
        let (logits, distribution) = masked_softmax(&logits, &values_mask.unsqueeze(1), 2)?;
        let output = distribution.matmul(values).apply_t(&self.dropout, train);

        Ok(AttentionOutput {
            logits,
            distribution,
            output,
        })
    }
}
