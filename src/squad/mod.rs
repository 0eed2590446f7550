//! # Span extraction question answering model
//!
//! Assembles the encoders, attention layers and span heads into a complete model: word (and
//! optionally character) embeddings are encoded by a shared bidirectional GRU, the context attends
//! to the question, a second GRU models the attention output and a span head predicts the start
//! and end distributions over the context.
//!
//! The attention and head variants are chosen in the `SquadConfig` and resolved once, when the
//! model is built.
//!
//! ```no_run
//! # fn main() -> Result<(), rust_squad::RustSquadError> {
//! use rust_squad::squad::{decode_spans, SquadConfig, SquadInput, SquadModel};
//! use rust_squad::Config;
//! use tch::{nn, no_grad, Device, Kind, Tensor};
//!
//! let device = Device::cuda_if_available();
//! let mut vs = nn::VarStore::new(device);
//! let config = SquadConfig::from_file("path/to/config.json")?;
//! let model = SquadModel::new(&vs.root(), &config)?;
//! vs.load("path/to/model.ot")?;
//!
//! # let input = SquadInput {
//! #     context_ids: Tensor::zeros(&[1, 10], (Kind::Int64, device)),
//! #     context_mask: Tensor::ones(&[1, 10], (Kind::Int64, device)),
//! #     context_char_ids: None,
//! #     question_ids: Tensor::zeros(&[1, 5], (Kind::Int64, device)),
//! #     question_mask: Tensor::ones(&[1, 5], (Kind::Int64, device)),
//! #     question_char_ids: None,
//! # };
//! let output = no_grad(|| model.forward_t(&input, false))?;
//! let spans = decode_spans(
//!     &output.start_probabilities,
//!     &output.end_probabilities,
//!     model.max_answer_length(),
//! )?;
//! # Ok(())
//! # }
//! ```

mod decoding;
mod embeddings;
mod squad_model;

pub use decoding::{decode_spans, Span};
pub use embeddings::WordEmbeddings;
pub use squad_model::{SquadConfig, SquadInput, SquadModel, SquadOutput};

pub use crate::attention::AttentionVariant;
pub use crate::heads::OutputVariant;
