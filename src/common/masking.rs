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

use crate::RustSquadError;
use tch::Tensor;

/// Value added to the logits of padded positions before normalization.
/// Large enough to drive their probability to exactly 0 in single precision,
/// finite so that no `NaN` can appear when a whole row is padding.
pub const VERY_NEGATIVE_NUMBER: f64 = -1e30;

/// # Masked softmax
/// Softmax over `dim` ignoring the padded positions of `logits`.
///
/// # Arguments
///
/// * `logits` - `Tensor` of arbitrary shape
/// * `mask` - `Tensor` broadcastable to the shape of `logits`, 1 for real positions and 0 for padding
/// * `dim` - dimension to normalize over
///
/// # Returns
///
/// * `masked_logits` - `logits` with `-1e30` added at the padded positions
/// * `prob_dist` - softmax of `masked_logits` over `dim`: 0 at padded positions, summing to 1
///
/// A row that is entirely padding does not raise an error: all its masked logits collapse to
/// the sentinel and the resulting distribution is uniform over the row. Callers are expected
/// to ignore such rows.
///
/// # Example
///
/// ```no_run
/// use rust_squad::common::masking::masked_softmax;
/// use tch::Tensor;
///
/// let logits = Tensor::of_slice(&[2.0f32, 1.0, 0.5, 10.0, 10.0]).unsqueeze(0);
/// let mask = Tensor::of_slice(&[1i64, 1, 1, 0, 0]).unsqueeze(0);
/// let (_masked_logits, probabilities) = masked_softmax(&logits, &mask, 1).unwrap();
/// ```
pub fn masked_softmax(
    logits: &Tensor,
    mask: &Tensor,
    dim: i64,
) -> Result<(Tensor, Tensor), RustSquadError> {
    let mask = mask.to_kind(logits.kind());
    let exp_mask = (1.0 - mask) * VERY_NEGATIVE_NUMBER;
    let masked_logits = logits.f_add(&exp_mask)?;
    let prob_dist = masked_logits.f_softmax(dim, logits.kind())?;
    Ok((masked_logits, prob_dist))
}

/// Checks that `mask` is a (batch, sequence_length) tensor matching the two leading
/// dimensions of `sequence`.
pub fn check_mask(sequence: &Tensor, mask: &Tensor, name: &str) -> Result<(), RustSquadError> {
    let sequence_shape = sequence.size();
    let mask_shape = mask.size();
    if sequence_shape.len() < 2 {
        return Err(RustSquadError::ShapeMismatch(format!(
            "{} must have at least 2 dimensions (batch, sequence_length), got {:?}",
            name, sequence_shape
        )));
    }
    if mask_shape.len() != 2 || mask_shape[..] != sequence_shape[..2] {
        return Err(RustSquadError::ShapeMismatch(format!(
            "mask for {} must have shape {:?}, got {:?}",
            name,
            &sequence_shape[..2],
            mask_shape
        )));
    }
    Ok(())
}

/// Checks that `tensor` has exactly `rank` dimensions.
pub fn check_rank(tensor: &Tensor, rank: usize, name: &str) -> Result<(), RustSquadError> {
    let shape = tensor.size();
    if shape.len() != rank {
        return Err(RustSquadError::ShapeMismatch(format!(
            "{} must have {} dimensions, got {:?}",
            name, rank, shape
        )));
    }
    Ok(())
}

/// Checks that two (batch, sequence_length, width) tensors share their batch size and width.
pub fn check_same_batch_and_width(
    first: &Tensor,
    second: &Tensor,
    names: (&str, &str),
) -> Result<(), RustSquadError> {
    check_rank(first, 3, names.0)?;
    check_rank(second, 3, names.1)?;
    let (first_shape, second_shape) = (first.size(), second.size());
    if first_shape[0] != second_shape[0] || first_shape[2] != second_shape[2] {
        return Err(RustSquadError::ShapeMismatch(format!(
            "{} {:?} and {} {:?} must share batch size and vector width",
            names.0, first_shape, names.1, second_shape
        )));
    }
    Ok(())
}
