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
use crate::common::linear::{vector_projection, VectorProjection};
use crate::common::masking::{check_mask, check_same_batch_and_width, masked_softmax};
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # Bidirectional attention flow
/// Context-to-query and query-to-context attention
/// ([Seo et al., 2016](https://arxiv.org/abs/1611.01603)). The trainable similarity between a
/// document vector `d` and a query vector `q` is
/// `w_mult . (d * q) + w_documents . d + w_queries . q`.
/// It is made of the following blocks:
/// - `w_sim_mult`: weights applied to the element-wise product of document and query vectors
/// - `w_sim_documents`: weights applied to the document vectors
/// - `w_sim_queries`: weights applied to the query vectors
#[derive(Debug)]
pub struct BiDafAttention {
    w_sim_mult: VectorProjection,
    w_sim_documents: VectorProjection,
    w_sim_queries: VectorProjection,
    vector_size: i64,
}

impl BiDafAttention {
    /// Build a new `BiDafAttention`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the attention layer
    /// * `vector_size` - width of the document and query vectors
    pub fn new<'p, P>(p: P, vector_size: i64) -> BiDafAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        BiDafAttention {
            w_sim_mult: vector_projection(p, "w_sim_mult", vector_size),
            w_sim_documents: vector_projection(p, "w_sim_docs", vector_size),
            w_sim_queries: vector_projection(p, "w_sim_queries", vector_size),
            vector_size,
        }
    }

    /// Width of the attention output (`4 * vector_size`)
    pub fn output_size(&self) -> i64 {
        4 * self.vector_size
    }

    /// Forward pass through the attention layer
    ///
    /// # Arguments
    ///
    /// * `documents` - `Tensor` of shape (*batch size*, *num_docs*, *vector_size*)
    /// * `documents_mask` - mask of shape (*batch size*, *num_docs*)
    /// * `queries` - `Tensor` of shape (*batch size*, *num_queries*, *vector_size*)
    /// * `queries_mask` - mask of shape (*batch size*, *num_queries*)
    ///
    /// # Returns
    ///
    /// * `AttentionOutput` containing:
    ///   - `logits` - masked similarity matrix of shape (*batch size*, *num_docs*, *num_queries*)
    ///   - `distribution` - context-to-query attention of shape (*batch size*, *num_docs*, *num_queries*)
    ///   - `output` - `[documents, c2q, documents * c2q, documents * q2c]` of shape (*batch size*, *num_docs*, *4 x vector_size*)
    pub fn forward_t(
        &self,
        documents: &Tensor,
        documents_mask: &Tensor,
        queries: &Tensor,
        queries_mask: &Tensor,
    ) -> Result<AttentionOutput, RustSquadError> {
        check_same_batch_and_width(documents, queries, ("documents", "queries"))?;
        check_mask(documents, documents_mask, "documents")?;
        check_mask(queries, queries_mask, "queries")?;
        if documents.size()[2] != self.vector_size {
            return Err(RustSquadError::ShapeMismatch(format!(
                "BiDAF attention expects vectors of width {}, got {}",
                self.vector_size,
                documents.size()[2]
            )));
        }

        let weighted_mult = (documents * &self.w_sim_mult.ws).matmul(&queries.transpose(1, 2));
        let weighted_documents = documents.apply(&self.w_sim_documents).unsqueeze(2);
        let weighted_queries = queries.apply(&self.w_sim_queries).unsqueeze(1);
        let similarity = weighted_mult + weighted_documents + weighted_queries;

        let documents_mask = documents_mask.to_kind(similarity.kind());
        let queries_mask = queries_mask.to_kind(similarity.kind());
        let mask = documents_mask.unsqueeze(2) * queries_mask.unsqueeze(1);

        let (masked_similarity, context_to_query) = masked_softmax(&similarity, &mask, 2)?;
        let attended_queries = context_to_query.matmul(queries);

        let (max_similarity, _) = masked_similarity.max_dim(2, false);
        let (_, beta) = masked_softmax(&max_similarity, &documents_mask, 1)?;
        let attended_context = beta.unsqueeze(1).matmul(documents);

        let output = Tensor::cat(
            &[
                documents,
                &attended_queries,
                &(documents * &attended_queries),
                &(documents * &attended_context),
            ],
            2,
        );

        Ok(AttentionOutput {
            logits: masked_similarity,
            distribution: context_to_query,
            output,
        })
    }
}
