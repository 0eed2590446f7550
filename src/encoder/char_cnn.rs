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

use crate::common::dropout::Dropout;
use crate::common::masking::{check_mask, check_rank};
use crate::squad::SquadConfig;
use crate::RustSquadError;
use std::borrow::Borrow;
use tch::{nn, Kind, Tensor};

/// # Convolutional character encoder
/// Builds a fixed-width vector for every word from its characters:
/// - `char_embeddings`: learned embedding per character id
/// - `conv`: 1-D convolution over the characters of a word with "same" padding, followed by `tanh`
/// - max-pooling over the character axis and dropout
///
/// Words shorter than the convolution kernel are supported thanks to the padding.
#[derive(Debug)]
pub struct CharacterEncoder {
    char_embeddings: nn::Embedding,
    conv: nn::Conv1D,
    dropout: Dropout,
    char_vocab_size: i64,
    filters: i64,
}

impl CharacterEncoder {
    /// Build a new `CharacterEncoder`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the character encoder
    /// * `config` - `SquadConfig` providing the character vocabulary size, embedding size, number of filters and kernel size
    pub fn new<'p, P>(p: P, config: &SquadConfig) -> CharacterEncoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let char_embeddings = nn::embedding(
            p / "char_embeddings",
            config.char_vocab_size,
            config.char_embedding_size,
            Default::default(),
        );
        let conv_config = nn::ConvConfig {
            padding: config.char_kernel_size / 2,
            ..Default::default()
        };
        let conv = nn::conv1d(
            p / "conv",
            config.char_embedding_size,
            config.char_filters,
            config.char_kernel_size,
            conv_config,
        );

        CharacterEncoder {
            char_embeddings,
            conv,
            dropout: Dropout::from_keep_prob(config.char_keep_prob),
            char_vocab_size: config.char_vocab_size,
            filters: config.char_filters,
        }
    }

    /// Width of the per-word representation (number of convolution filters)
    pub fn output_size(&self) -> i64 {
        self.filters
    }

    /// Forward pass through the character encoder
    ///
    /// # Arguments
    ///
    /// * `char_ids` - character ids of shape (*batch size*, *sequence_length*, *word_length*)
    /// * `mask` - word mask of shape (*batch size*, *sequence_length*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `Tensor` of shape (*batch size*, *sequence_length*, *filters*), zero at padded words
    pub fn forward_t(
        &self,
        char_ids: &Tensor,
        mask: &Tensor,
        train: bool,
    ) -> Result<Tensor, RustSquadError> {
        check_rank(char_ids, 3, "character ids")?;
        check_mask(char_ids, mask, "character ids")?;
        let (batch_size, sequence_length, word_length) = char_ids.size3()?;
        if batch_size == 0 || sequence_length == 0 {
            return Err(RustSquadError::ShapeMismatch(format!(
                "character ids must contain at least one word, got shape {:?}",
                char_ids.size()
            )));
        }
        if word_length == 0 {
            return Err(RustSquadError::ShapeMismatch(
                "character ids must contain at least one character per word".into(),
            ));
        }
        let max_id = char_ids.f_max()?.f_int64_value(&[])?;
        let min_id = char_ids.f_min()?.f_int64_value(&[])?;
        if min_id < 0 || max_id >= self.char_vocab_size {
            return Err(RustSquadError::InvalidInput(format!(
                "character ids must be in [0, {}), got values in [{}, {}]",
                self.char_vocab_size, min_id, max_id
            )));
        }

        let embedded = char_ids
            .view((-1, word_length))
            .apply(&self.char_embeddings)
            .transpose(1, 2);
        let (pooled, _) = embedded.apply(&self.conv).tanh().max_dim(2, false);
        let word_mask = mask.to_kind(Kind::Float).unsqueeze(-1);
        let output = pooled.view((batch_size, sequence_length, self.filters)) * word_mask;

        Ok(output.apply_t(&self.dropout, train))
    }
}
