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

use crate::common::masking::check_rank;
use crate::RustSquadError;
use serde::{Deserialize, Serialize};
use tch::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// # Predicted answer span
pub struct Span {
    /// Context position of the first token of the answer
    pub start: i64,
    /// Context position of the last token of the answer (inclusive)
    pub end: i64,
    /// Joint probability `p_start(start) * p_end(end)`
    pub score: f64,
}

/// Picks the most likely answer span of every example.
///
/// The span maximizes `p_start(start) * p_end(end)` under `start <= end < start + max_answer_length`.
///
/// # Arguments
///
/// * `start_probabilities` - start distributions of shape (*batch size*, *context_length*)
/// * `end_probabilities` - end distributions of shape (*batch size*, *context_length*)
/// * `max_answer_length` - maximum number of tokens in an answer
///
/// # Returns
///
/// * `Vec<Span>` with one span per example
pub fn decode_spans(
    start_probabilities: &Tensor,
    end_probabilities: &Tensor,
    max_answer_length: i64,
) -> Result<Vec<Span>, RustSquadError> {
    check_rank(start_probabilities, 2, "start probabilities")?;
    check_rank(end_probabilities, 2, "end probabilities")?;
    if start_probabilities.size() != end_probabilities.size() {
        return Err(RustSquadError::ShapeMismatch(format!(
            "start {:?} and end {:?} probabilities must have the same shape",
            start_probabilities.size(),
            end_probabilities.size()
        )));
    }
    if max_answer_length < 1 {
        return Err(RustSquadError::InvalidInput(format!(
            "maximum answer length must be positive, got {}",
            max_answer_length
        )));
    }

    let (batch_size, context_length) = (
        start_probabilities.size()[0],
        start_probabilities.size()[1],
    );
    let valid_spans = Tensor::ones(
        &[context_length, context_length],
        (start_probabilities.kind(), start_probabilities.device()),
    )
    .triu(0)
    .tril(max_answer_length - 1);
    let span_scores =
        start_probabilities.unsqueeze(2) * end_probabilities.unsqueeze(1) * valid_spans;
    let (best_scores, best_positions) = span_scores.view((batch_size, -1)).max_dim(1, false);

    Ok((0..batch_size)
        .map(|example| {
            let position = best_positions.int64_value(&[example]);
            Span {
                start: position / context_length,
                end: position % context_length,
                score: best_scores.double_value(&[example]),
            }
        })
        .collect())
}
