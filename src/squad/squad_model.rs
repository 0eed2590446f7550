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

use crate::attention::{AttentionVariant, PrimaryAttention, SelfAttention};
use crate::common::masking::check_mask;
use crate::encoder::{CharacterEncoder, SequenceEncoder};
use crate::heads::{OutputVariant, SpanHead};
use crate::squad::embeddings::WordEmbeddings;
use crate::{Config, RustSquadError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::{nn, Tensor};

fn default_char_vocab_size() -> i64 {
    176
}

fn default_char_embedding_size() -> i64 {
    8
}

fn default_char_filters() -> i64 {
    32
}

fn default_char_kernel_size() -> i64 {
    5
}

fn default_char_keep_prob() -> f64 {
    0.5
}

fn default_max_answer_length() -> i64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// # Question answering model configuration
/// Defines the model architecture (hidden size, attention and output variants, character features...)
pub struct SquadConfig {
    /// Hidden size of the recurrent encoders
    pub hidden_size: i64,
    /// Keep probability of the dropout layers, in (0, 1]
    pub keep_prob: f64,
    /// Attention between the context and the question
    #[serde(alias = "attn")]
    pub attention: AttentionVariant,
    /// Span prediction head
    pub output: OutputVariant,
    /// Concatenate character-level features to the word embeddings
    pub char_embed: bool,
    /// Number of words in the (pretrained) word embedding table
    pub vocab_size: i64,
    /// Width of the word embeddings
    pub embedding_size: i64,
    /// Add a self-attention stage over the modeling layer output
    #[serde(default)]
    pub self_attention: bool,
    /// Number of character ids, including padding and unknown characters
    #[serde(default = "default_char_vocab_size")]
    pub char_vocab_size: i64,
    #[serde(default = "default_char_embedding_size")]
    pub char_embedding_size: i64,
    /// Number of convolution filters, i.e. width of the character-level word features
    #[serde(default = "default_char_filters")]
    pub char_filters: i64,
    #[serde(default = "default_char_kernel_size")]
    pub char_kernel_size: i64,
    #[serde(default = "default_char_keep_prob")]
    pub char_keep_prob: f64,
    /// Maximum number of tokens of a decoded answer span
    #[serde(default = "default_max_answer_length")]
    pub max_answer_length: i64,
}

impl Config for SquadConfig {}

impl Default for SquadConfig {
    fn default() -> Self {
        SquadConfig {
            hidden_size: 200,
            keep_prob: 0.85,
            attention: AttentionVariant::Bidaf,
            output: OutputVariant::BidafOut,
            char_embed: false,
            vocab_size: 400_002,
            embedding_size: 100,
            self_attention: false,
            char_vocab_size: default_char_vocab_size(),
            char_embedding_size: default_char_embedding_size(),
            char_filters: default_char_filters(),
            char_kernel_size: default_char_kernel_size(),
            char_keep_prob: default_char_keep_prob(),
            max_answer_length: default_max_answer_length(),
        }
    }
}

impl SquadConfig {
    /// Checks the sizes and probabilities of the configuration
    pub fn validate(&self) -> Result<(), RustSquadError> {
        for (name, value) in &[
            ("hidden_size", self.hidden_size),
            ("vocab_size", self.vocab_size),
            ("embedding_size", self.embedding_size),
            ("char_vocab_size", self.char_vocab_size),
            ("char_embedding_size", self.char_embedding_size),
            ("char_filters", self.char_filters),
            ("char_kernel_size", self.char_kernel_size),
            ("max_answer_length", self.max_answer_length),
        ] {
            if *value <= 0 {
                return Err(RustSquadError::InvalidConfigurationError(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in &[
            ("keep_prob", self.keep_prob),
            ("char_keep_prob", self.char_keep_prob),
        ] {
            if !(*value > 0.0 && *value <= 1.0) {
                return Err(RustSquadError::InvalidConfigurationError(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// # Batch of question answering inputs
pub struct SquadInput {
    /// Context word ids of shape (*batch size*, *context_length*)
    pub context_ids: Tensor,
    /// Context mask of shape (*batch size*, *context_length*)
    pub context_mask: Tensor,
    /// Context character ids of shape (*batch size*, *context_length*, *word_length*), required with character features
    pub context_char_ids: Option<Tensor>,
    /// Question word ids of shape (*batch size*, *question_length*)
    pub question_ids: Tensor,
    /// Question mask of shape (*batch size*, *question_length*)
    pub question_mask: Tensor,
    /// Question character ids of shape (*batch size*, *question_length*, *word_length*), required with character features
    pub question_char_ids: Option<Tensor>,
}

/// Container for the question answering model output
pub struct SquadOutput {
    /// Start logits of shape (*batch size*, *context_length*), `-1e30` added at padded positions
    pub start_logits: Tensor,
    /// Start probabilities of shape (*batch size*, *context_length*)
    pub start_probabilities: Tensor,
    /// End logits of shape (*batch size*, *context_length*), `-1e30` added at padded positions
    pub end_logits: Tensor,
    /// End probabilities of shape (*batch size*, *context_length*)
    pub end_probabilities: Tensor,
}

/// # Span extraction question answering model
/// It is made of the following blocks:
/// - `word_embeddings`: frozen pretrained word embeddings
/// - `char_encoder`: optional character CNN, shared by the context and the question
/// - `context_encoder`: bidirectional GRU shared by the context and the question
/// - `attention`: context-to-question attention (basic, BiDAF or attention-over-attention)
/// - `modeling_encoder`: bidirectional GRU over the attention output
/// - `self_attention`: optional self-attention over the modeling output, added to it
/// - `head`: span prediction head (softmax, answer pointer or BiDAF output)
pub struct SquadModel {
    word_embeddings: WordEmbeddings,
    char_encoder: Option<CharacterEncoder>,
    context_encoder: SequenceEncoder,
    attention: PrimaryAttention,
    modeling_encoder: SequenceEncoder,
    self_attention: Option<SelfAttention>,
    head: SpanHead,
    max_answer_length: i64,
}

impl SquadModel {
    /// Build a new `SquadModel`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the model
    /// * `config` - `SquadConfig` object defining the model architecture
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rust_squad::squad::{SquadConfig, SquadModel};
    /// use rust_squad::Config;
    /// use std::path::Path;
    /// use tch::{nn, Device};
    ///
    /// let config_path = Path::new("path/to/config.json");
    /// let device = Device::Cpu;
    /// let p = nn::VarStore::new(device);
    /// let config = SquadConfig::from_file(config_path).unwrap();
    /// let model = SquadModel::new(&p.root() / "squad", &config).unwrap();
    /// ```
    pub fn new<'p, P>(p: P, config: &SquadConfig) -> Result<SquadModel, RustSquadError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        config.validate()?;
        let p = p.borrow();
        info!(
            "building question answering model: attention={}, output={}",
            config.attention, config.output
        );
        info!(
            "character features: {}, self-attention: {}",
            config.char_embed, config.self_attention
        );

        let word_embeddings = WordEmbeddings::new(p / "word_embeddings", config);
        let char_encoder = if config.char_embed {
            Some(CharacterEncoder::new(p / "char_encoder", config))
        } else {
            None
        };
        let input_size = word_embeddings.embedding_size()
            + char_encoder
                .as_ref()
                .map_or(0, |encoder| encoder.output_size());

        let context_encoder = SequenceEncoder::new(
            p / "context_encoder",
            input_size,
            config.hidden_size,
            config.keep_prob,
        );
        let encoded_size = context_encoder.output_size();

        let attention = PrimaryAttention::new(
            p / "attention",
            config.attention,
            encoded_size,
            config.keep_prob,
        );
        let attention_size = PrimaryAttention::output_size(config.attention, encoded_size);

        let modeling_encoder = SequenceEncoder::new(
            p / "modeling_encoder",
            attention_size,
            config.hidden_size,
            config.keep_prob,
        );
        let self_attention = if config.self_attention {
            Some(SelfAttention::new(
                p / "self_attention",
                modeling_encoder.output_size(),
                config.keep_prob,
            ))
        } else {
            None
        };

        let head = SpanHead::new(
            p,
            config.output,
            attention_size,
            config.hidden_size,
            config.keep_prob,
        );
        debug!(
            "encoder input width {}, encoded width {}, attention output width {}",
            input_size, encoded_size, attention_size
        );

        Ok(SquadModel {
            word_embeddings,
            char_encoder,
            context_encoder,
            attention,
            modeling_encoder,
            self_attention,
            head,
            max_answer_length: config.max_answer_length,
        })
    }

    /// Loads a pretrained (*vocab_size*, *embedding_size*) word embedding matrix
    pub fn set_word_embeddings(
        &mut self,
        embedding_matrix: &Tensor,
    ) -> Result<(), RustSquadError> {
        self.word_embeddings.set_pretrained(embedding_matrix)
    }

    /// Maximum answer length configured for span decoding
    pub fn max_answer_length(&self) -> i64 {
        self.max_answer_length
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `input` - `SquadInput` batch of contexts and questions
    /// * `train` - boolean flag to turn on/off the dropout layers in the model. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `SquadOutput` containing:
    ///   - `start_logits` - `Tensor` of shape (*batch size*, *context_length*)
    ///   - `start_probabilities` - `Tensor` of shape (*batch size*, *context_length*)
    ///   - `end_logits` - `Tensor` of shape (*batch size*, *context_length*)
    ///   - `end_probabilities` - `Tensor` of shape (*batch size*, *context_length*)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tch::{nn, no_grad, Device, Kind, Tensor};
    /// # use rust_squad::squad::{SquadConfig, SquadInput, SquadModel};
    /// # let device = Device::Cpu;
    /// # let vs = nn::VarStore::new(device);
    /// # let config = SquadConfig::default();
    /// # let model = SquadModel::new(&vs.root(), &config).unwrap();
    /// let (batch_size, context_length, question_length) = (32, 300, 30);
    /// let input = SquadInput {
    ///     context_ids: Tensor::randint(config.vocab_size, &[batch_size, context_length], (Kind::Int64, device)),
    ///     context_mask: Tensor::ones(&[batch_size, context_length], (Kind::Int64, device)),
    ///     context_char_ids: None,
    ///     question_ids: Tensor::randint(config.vocab_size, &[batch_size, question_length], (Kind::Int64, device)),
    ///     question_mask: Tensor::ones(&[batch_size, question_length], (Kind::Int64, device)),
    ///     question_char_ids: None,
    /// };
    /// let output = no_grad(|| model.forward_t(&input, false)).unwrap();
    /// ```
    pub fn forward_t(
        &self,
        input: &SquadInput,
        train: bool,
    ) -> Result<SquadOutput, RustSquadError> {
        check_mask(&input.context_ids, &input.context_mask, "context ids")?;
        check_mask(&input.question_ids, &input.question_mask, "question ids")?;

        let mut context_input = self.word_embeddings.forward(&input.context_ids)?;
        let mut question_input = self.word_embeddings.forward(&input.question_ids)?;

        if let Some(char_encoder) = &self.char_encoder {
            let (context_char_ids, question_char_ids) =
                match (&input.context_char_ids, &input.question_char_ids) {
                    (Some(context_char_ids), Some(question_char_ids)) => {
                        (context_char_ids, question_char_ids)
                    }
                    _ => {
                        return Err(RustSquadError::InvalidInput(
                            "character embeddings are enabled: character ids are required \
                             for the context and the question"
                                .into(),
                        ));
                    }
                };
            let context_chars =
                char_encoder.forward_t(context_char_ids, &input.context_mask, train)?;
            let question_chars =
                char_encoder.forward_t(question_char_ids, &input.question_mask, train)?;
            context_input = Tensor::cat(&[context_input, context_chars], 2);
            question_input = Tensor::cat(&[question_input, question_chars], 2);
        }

        let context_hiddens =
            self.context_encoder.forward_t(&context_input, &input.context_mask, train)?;
        let question_hiddens =
            self.context_encoder.forward_t(&question_input, &input.question_mask, train)?;

        let attention_output = self
            .attention
            .forward_t(
                &context_hiddens,
                &input.context_mask,
                &input.context_ids,
                &question_hiddens,
                &input.question_mask,
                train,
            )?
            .output;

        let mut modeling_output =
            self.modeling_encoder.forward_t(&attention_output, &input.context_mask, train)?;
        if let Some(self_attention) = &self.self_attention {
            let self_attended =
                self_attention.forward_t(&modeling_output, &input.context_mask, train)?;
            modeling_output = modeling_output + self_attended.output;
        }

        let spans = self.head.forward_t(
            &attention_output,
            &modeling_output,
            &input.context_mask,
            train,
        )?;

        Ok(SquadOutput {
            start_logits: spans.start_logits,
            start_probabilities: spans.start_probabilities,
            end_logits: spans.end_logits,
            end_probabilities: spans.end_probabilities,
        })
    }
}
