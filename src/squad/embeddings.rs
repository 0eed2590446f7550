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
use crate::squad::SquadConfig;
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::{nn, no_grad, Tensor};

/// # Frozen word embeddings
/// Lookup table of pretrained word vectors (e.g. GloVe). The table is registered in the variable
/// store as a non-trainable variable: it is saved and loaded with the model weights but never
/// updated by an optimizer.
#[derive(Debug)]
pub struct WordEmbeddings {
    weight: Tensor,
    vocab_size: i64,
    embedding_size: i64,
}

impl WordEmbeddings {
    pub fn new<'p, P>(p: P, config: &SquadConfig) -> WordEmbeddings
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let weight = p.zeros_no_train("weight", &[config.vocab_size, config.embedding_size]);
        WordEmbeddings {
            weight,
            vocab_size: config.vocab_size,
            embedding_size: config.embedding_size,
        }
    }

    pub fn embedding_size(&self) -> i64 {
        self.embedding_size
    }

    /// Copies a pretrained (*vocab_size*, *embedding_size*) matrix into the lookup table.
    pub fn set_pretrained(&mut self, embedding_matrix: &Tensor) -> Result<(), RustSquadError> {
        let expected = [self.vocab_size, self.embedding_size];
        if embedding_matrix.size()[..] != expected[..] {
            return Err(RustSquadError::ShapeMismatch(format!(
                "pretrained embedding matrix must have shape {:?}, got {:?}",
                expected,
                embedding_matrix.size()
            )));
        }
        let weight = &mut self.weight;
        no_grad(|| weight.copy_(embedding_matrix));
        Ok(())
    }

    /// Looks up the vectors of `input_ids` (*batch size*, *sequence_length*), returning a tensor of
    /// shape (*batch size*, *sequence_length*, *embedding_size*).
    pub fn forward(&self, input_ids: &Tensor) -> Result<Tensor, RustSquadError> {
        check_rank(input_ids, 2, "input ids")?;
        Ok(Tensor::f_embedding(&self.weight, input_ids, -1, false, false)?)
    }
}
