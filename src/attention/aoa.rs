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
use crate::common::masking::{check_mask, check_rank, check_same_batch_and_width, masked_softmax};
use crate::RustSquadError;
use std::collections::HashMap;
use tch::{Device, Kind, Tensor};

/// # Attention-over-attention
/// Nested attention over the document/query similarity matrix
/// ([Cui et al., 2016](https://arxiv.org/abs/1607.04423)):
/// - column-wise softmax (over documents) of the similarity matrix gives the document-level
///   attention of every query word
/// - row-wise softmax (over queries), averaged over the documents, gives the importance of every
///   query word
/// - their product scores every document position; scores of positions holding the same token are
///   summed (see `segmented_sum`)
///
/// The masked softmax of the summed score over the documents is returned as `document_scores`.
/// The distribution used to weight the query vectors is not that softmax: for every document
/// position it is the masked softmax over the query of `summed_score[d] * similarity[d, q]`, so the
/// summed score sharpens or flattens the distribution of that position over the query.
#[derive(Debug)]
pub struct AoaAttention {
    dropout: Dropout,
}

/// Container for the attention-over-attention output
pub struct AoaAttentionOutput {
    /// Masked logits of shape (*batch size*, *num_docs*, *num_queries*)
    pub logits: Tensor,
    /// Distribution over the query for every document position (*batch size*, *num_docs*, *num_queries*)
    pub distribution: Tensor,
    /// Weighted query vectors (*batch size*, *num_docs*, *vector_size*)
    pub output: Tensor,
    /// Document scores after the sum over identical tokens (*batch size*, *num_docs*)
    pub summed_scores: Tensor,
    /// Masked softmax of `summed_scores` over the documents (*batch size*, *num_docs*)
    pub document_scores: Tensor,
}

impl From<AoaAttentionOutput> for AttentionOutput {
    fn from(aoa_output: AoaAttentionOutput) -> Self {
        AttentionOutput {
            logits: aoa_output.logits,
            distribution: aoa_output.distribution,
            output: aoa_output.output,
        }
    }
}

impl AoaAttention {
    pub fn new(keep_prob: f64) -> AoaAttention {
        AoaAttention {
            dropout: Dropout::from_keep_prob(keep_prob),
        }
    }

    /// Forward pass through the attention layer
    ///
    /// # Arguments
    ///
    /// * `document_ids` - token ids of the documents, shape (*batch size*, *num_docs*)
    /// * `documents` - `Tensor` of shape (*batch size*, *num_docs*, *vector_size*)
    /// * `documents_mask` - mask of shape (*batch size*, *num_docs*)
    /// * `queries` - `Tensor` of shape (*batch size*, *num_queries*, *vector_size*)
    /// * `queries_mask` - mask of shape (*batch size*, *num_queries*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `AoaAttentionOutput`
    pub fn forward_t(
        &self,
        document_ids: &Tensor,
        documents: &Tensor,
        documents_mask: &Tensor,
        queries: &Tensor,
        queries_mask: &Tensor,
        train: bool,
    ) -> Result<AoaAttentionOutput, RustSquadError> {
        check_same_batch_and_width(documents, queries, ("documents", "queries"))?;
        check_mask(documents, documents_mask, "documents")?;
        check_mask(documents, document_ids, "document ids")?;
        check_mask(queries, queries_mask, "queries")?;

        let similarity = documents.matmul(&queries.transpose(1, 2));
        let kind = similarity.kind();
        let documents_mask = documents_mask.to_kind(kind);
        let queries_mask = queries_mask.to_kind(kind);

        let (_, document_attention) = masked_softmax(&similarity, &documents_mask.unsqueeze(2), 1)?;
        let (_, query_attention) = masked_softmax(&similarity, &queries_mask.unsqueeze(1), 2)?;

        let valid_documents = documents_mask
            .sum_dim_intlist(&[1], true, kind)
            .clamp_min(1.0);
        let query_importance = (query_attention * documents_mask.unsqueeze(2))
            .sum_dim_intlist(&[1], false, kind)
            / valid_documents;

        let scores = document_attention
            .matmul(&query_importance.unsqueeze(2))
            .select(2, 0);
        let summed_scores = segmented_sum(&scores, document_ids)?;
        let (_, document_scores) = masked_softmax(&summed_scores, &documents_mask, 1)?;

        let gated_similarity = similarity * summed_scores.unsqueeze(2);
        let (logits, distribution) =
            masked_softmax(&gated_similarity, &queries_mask.unsqueeze(1), 2)?;
        let output = distribution.matmul(queries).apply_t(&self.dropout, train);

        Ok(AoaAttentionOutput {
            logits,
            distribution,
            output,
            summed_scores,
            document_scores,
        })
    }
}

/// Sums the scores of positions sharing the same id and writes the sum back to each of them,
/// independently for every batch example.
///
/// # Arguments
///
/// * `scores` - `Tensor` of shape (*batch size*, *sequence_length*)
/// * `ids` - integer `Tensor` of shape (*batch size*, *sequence_length*)
///
/// # Returns
///
/// * `Tensor` of shape (*batch size*, *sequence_length*) where every position holds the total
///   score of its id within its example
///
/// # Example
///
/// ```no_run
/// use rust_squad::attention::segmented_sum;
/// use tch::Tensor;
///
/// let scores = Tensor::of_slice(&[0.1f32, 0.2, 0.3, 0.4]).unsqueeze(0);
/// let ids = Tensor::of_slice(&[7i64, 3, 7, 5]).unsqueeze(0);
/// // [[0.4, 0.2, 0.4, 0.4]]
/// let summed = segmented_sum(&scores, &ids).unwrap();
/// ```
pub fn segmented_sum(scores: &Tensor, ids: &Tensor) -> Result<Tensor, RustSquadError> {
    check_rank(scores, 2, "scores")?;
    check_rank(ids, 2, "ids")?;
    if scores.size() != ids.size() {
        return Err(RustSquadError::ShapeMismatch(format!(
            "scores {:?} and ids {:?} must have the same shape",
            scores.size(),
            ids.size()
        )));
    }

    let batch_size = scores.size()[0];
    let mut summed = Vec::with_capacity(batch_size as usize);
    for example in 0..batch_size {
        let example_ids = Vec::<i64>::from(
            &ids.select(0, example)
                .to_kind(Kind::Int64)
                .to_device(Device::Cpu),
        );

        let mut groups: HashMap<i64, i64> = HashMap::new();
        let group_index = example_ids
            .iter()
            .map(|id| {
                let next_group = groups.len() as i64;
                *groups.entry(*id).or_insert(next_group)
            })
            .collect::<Vec<i64>>();
        let group_index = Tensor::of_slice(&group_index).to_device(scores.device());

        let example_scores = scores.select(0, example);
        let group_totals = Tensor::zeros(
            &[groups.len() as i64],
            (example_scores.kind(), example_scores.device()),
        )
        .index_add(0, &group_index, &example_scores);
        summed.push(group_totals.index_select(0, &group_index));
    }

    Ok(Tensor::stack(&summed, 0))
}
