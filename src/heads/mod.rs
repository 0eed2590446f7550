//! # Span prediction heads
//!
//! Heads turn the final context representation into start and end logits and probability
//! distributions over the context positions (`SpanLogits`).
//!
//! - `SoftmaxHead`: independent linear projections for the start and end positions
//! - `AnswerPointerHead`: recurrent pointer network, the end is conditioned on the start step
//! - `BiDafOutputHead`: BiDAF output layer over the attention and modeling outputs
//!
//! `SpanHead` wraps the head selected by `OutputVariant` together with the layers it requires
//! (dense projection of the modeling output, or the additional end encoder for the BiDAF output),
//! so that every variant consumes the same inputs.

mod bidaf_output;
mod pointer;
mod softmax;

pub use bidaf_output::BiDafOutputHead;
pub use pointer::AnswerPointerHead;
pub use softmax::SoftmaxHead;

use crate::encoder::SequenceEncoder;
use crate::RustSquadError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use tch::{nn, Tensor};

/// Container for the span prediction
pub struct SpanLogits {
    /// Start logits of shape (*batch size*, *context_length*), `-1e30` added at padded positions
    pub start_logits: Tensor,
    /// Start probabilities of shape (*batch size*, *context_length*)
    pub start_probabilities: Tensor,
    /// End logits of shape (*batch size*, *context_length*), `-1e30` added at padded positions
    pub end_logits: Tensor,
    /// End probabilities of shape (*batch size*, *context_length*)
    pub end_probabilities: Tensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// # Span prediction head
pub enum OutputVariant {
    /// Independent start and end softmax layers
    Softmax,
    /// Answer pointer network
    AnsPtr,
    /// BiDAF output layer
    BidafOut,
}

impl FromStr for OutputVariant {
    type Err = RustSquadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "softmax" => Ok(OutputVariant::Softmax),
            "ans_ptr" => Ok(OutputVariant::AnsPtr),
            "bidaf_out" => Ok(OutputVariant::BidafOut),
            _ => Err(RustSquadError::InvalidConfigurationError(format!(
                "unknown output variant `{}`, expected one of softmax, ans_ptr, bidaf_out",
                s
            ))),
        }
    }
}

impl fmt::Display for OutputVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OutputVariant::Softmax => "softmax",
            OutputVariant::AnsPtr => "ans_ptr",
            OutputVariant::BidafOut => "bidaf_out",
        };
        write!(f, "{}", name)
    }
}

/// # Span head selected at construction
pub enum SpanHead {
    /// Dense projection of the modeling output followed by a `SoftmaxHead`
    Softmax {
        projection: nn::Linear,
        head: SoftmaxHead,
    },
    /// Dense projection of the modeling output followed by an `AnswerPointerHead`
    AnswerPointer {
        projection: nn::Linear,
        head: AnswerPointerHead,
    },
    /// Additional encoder pass over the modeling output followed by a `BiDafOutputHead`
    BiDafOutput {
        end_encoder: SequenceEncoder,
        head: BiDafOutputHead,
    },
}

impl SpanHead {
    /// Build the head for `variant`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the model
    /// * `variant` - `OutputVariant` to build
    /// * `attention_size` - width of the attention output
    /// * `hidden_size` - hidden size of the recurrent encoders (the modeling output has width `2 * hidden_size`)
    /// * `keep_prob` - keep probability for the dropout layers
    pub fn new<'p, P>(
        p: P,
        variant: OutputVariant,
        attention_size: i64,
        hidden_size: i64,
        keep_prob: f64,
    ) -> SpanHead
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();
        let modeling_size = 2 * hidden_size;
        match variant {
            OutputVariant::Softmax => SpanHead::Softmax {
                projection: nn::linear(
                    p / "final_context_reps",
                    modeling_size,
                    hidden_size,
                    Default::default(),
                ),
                head: SoftmaxHead::new(p / "softmax", hidden_size),
            },
            OutputVariant::AnsPtr => SpanHead::AnswerPointer {
                projection: nn::linear(
                    p / "final_context_reps",
                    modeling_size,
                    hidden_size,
                    Default::default(),
                ),
                head: AnswerPointerHead::new(p / "ans_ptr", hidden_size, keep_prob),
            },
            OutputVariant::BidafOut => SpanHead::BiDafOutput {
                end_encoder: SequenceEncoder::new(
                    p / "end_encoder",
                    modeling_size,
                    hidden_size,
                    keep_prob,
                ),
                head: BiDafOutputHead::new(p / "bidaf_out", attention_size, modeling_size),
            },
        }
    }

    /// Forward pass through the head
    ///
    /// # Arguments
    ///
    /// * `attention_output` - output of the context/question attention, shape (*batch size*, *context_length*, *attention_size*)
    /// * `modeling_output` - output of the modeling encoder, shape (*batch size*, *context_length*, *2 x hidden_size*)
    /// * `mask` - context mask of shape (*batch size*, *context_length*)
    /// * `train` - boolean flag to turn on/off the dropout layers. Should be set to false for inference.
    ///
    /// # Returns
    ///
    /// * `SpanLogits` with tensors of shape (*batch size*, *context_length*)
    pub fn forward_t(
        &self,
        attention_output: &Tensor,
        modeling_output: &Tensor,
        mask: &Tensor,
        train: bool,
    ) -> Result<SpanLogits, RustSquadError> {
        match self {
            SpanHead::Softmax { projection, head } => {
                let final_context_reps = modeling_output.apply(projection).relu();
                head.forward(&final_context_reps, mask)
            }
            SpanHead::AnswerPointer { projection, head } => {
                let final_context_reps = modeling_output.apply(projection).relu();
                head.forward_t(&final_context_reps, mask, train)
            }
            SpanHead::BiDafOutput { end_encoder, head } => {
                let end_modeling_output = end_encoder.forward_t(modeling_output, mask, train)?;
                head.forward(attention_output, modeling_output, &end_modeling_output, mask)
            }
        }
    }
}
