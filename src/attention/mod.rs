//! # Attention layers
//!
//! All attention layers share the `AttentionOutput` contract: masked attention logits, the
//! attention distribution (summing to 1 over the unpadded values of every key row) and the
//! attention output.
//!
//! - `BasicAttention`: dot-product attention of keys over values
//! - `BiDafAttention`: bidirectional attention flow between a document and a query
//! - `SelfAttention`: attention of a sequence over itself
//! - `AoaAttention`: attention-over-attention with a sum over identical document tokens
//!
//! The context/question attention of the model is selected once through `AttentionVariant` and
//! wrapped in `PrimaryAttention`, which exposes the same interface for every variant.

mod aoa;
mod basic;
mod bidaf;
mod self_attention;

pub use aoa::{segmented_sum, AoaAttention, AoaAttentionOutput};
pub use basic::BasicAttention;
pub use bidaf::BiDafAttention;
pub use self_attention::SelfAttention;

use crate::common::masking::check_mask;
use crate::RustSquadError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use tch::{nn, Tensor};

/// Container for the output of an attention layer
pub struct AttentionOutput {
    /// Attention logits, with `-1e30` added at padded value positions
    pub logits: Tensor,
    /// Attention distribution, 0 at padded value positions and summing to 1 over the values
    pub distribution: Tensor,
    /// Attention output
    pub output: Tensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// # Attention between the context and the question
pub enum AttentionVariant {
    /// Dot-product attention of the context over the question
    Basic,
    /// Bidirectional attention flow
    Bidaf,
    /// Attention-over-attention
    Aoa,
}

impl FromStr for AttentionVariant {
    type Err = RustSquadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(AttentionVariant::Basic),
            "bidaf" => Ok(AttentionVariant::Bidaf),
            "aoa" => Ok(AttentionVariant::Aoa),
            _ => Err(RustSquadError::InvalidConfigurationError(format!(
                "unknown attention variant `{}`, expected one of basic, bidaf, aoa",
                s
            ))),
        }
    }
}

impl fmt::Display for AttentionVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AttentionVariant::Basic => "basic",
            AttentionVariant::Bidaf => "bidaf",
            AttentionVariant::Aoa => "aoa",
        };
        write!(f, "{}", name)
    }
}

/// # Context/question attention selected at construction
pub enum PrimaryAttention {
    Basic(BasicAttention),
    BiDaf(BiDafAttention),
    Aoa(AoaAttention),
}

impl PrimaryAttention {
    /// Build the attention layer for `variant`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the attention layer
    /// * `variant` - `AttentionVariant` to build
    /// * `vector_size` - width of the encoded context and question vectors
    /// * `keep_prob` - keep probability for the dropout layers
    pub fn new<'p, P>(
        p: P,
        variant: AttentionVariant,
        vector_size: i64,
        keep_prob: f64,
    ) -> PrimaryAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        match variant {
            AttentionVariant::Basic => PrimaryAttention::Basic(BasicAttention::new(keep_prob)),
            AttentionVariant::Bidaf => {
                PrimaryAttention::BiDaf(BiDafAttention::new(p / "bidaf", vector_size))
            }
            AttentionVariant::Aoa => PrimaryAttention::Aoa(AoaAttention::new(keep_prob)),
        }
    }

    /// Width of the attention output for encoded vectors of width `vector_size`
    pub fn output_size(variant: AttentionVariant, vector_size: i64) -> i64 {
        match variant {
            AttentionVariant::Bidaf => 4 * vector_size,
            AttentionVariant::Basic | AttentionVariant::Aoa => vector_size,
        }
    }

    /// Forward pass: the context attends to the question
    ///
    /// # Arguments
    ///
    /// * `context` - encoded context of shape (*batch size*, *context_length*, *vector_size*)
    /// * `context_mask` - mask of shape (*batch size*, *context_length*)
    /// * `context_ids` - context token ids of shape (*batch size*, *context_length*), used by the attention-over-attention variant
    /// * `question` - encoded question of shape (*batch size*, *question_length*, *vector_size*)
    /// * `question_mask` - mask of shape (*batch size*, *question_length*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `AttentionOutput` whose `output` has shape (*batch size*, *context_length*, *output_size*)
    pub fn forward_t(
        &self,
        context: &Tensor,
        context_mask: &Tensor,
        context_ids: &Tensor,
        question: &Tensor,
        question_mask: &Tensor,
        train: bool,
    ) -> Result<AttentionOutput, RustSquadError> {
        check_mask(context, context_mask, "context")?;
        check_mask(question, question_mask, "question")?;
        match self {
            PrimaryAttention::Basic(attention) => {
                attention.forward_t(context, question, question_mask, train)
            }
            PrimaryAttention::BiDaf(attention) => {
                attention.forward_t(context, context_mask, question, question_mask)
            }
            PrimaryAttention::Aoa(attention) => Ok(attention
                .forward_t(
                    context_ids,
                    context,
                    context_mask,
                    question,
                    question_mask,
                    train,
                )?
                .into()),
        }
    }
}
