//! # Attention-based span extraction for question answering
//!
//! Neural question answering models predicting the start and end positions of the answer to a
//! question within a context passage, built on [tch-rs](https://github.com/LaurentMazare/tch-rs).
//!
//! The model combines:
//! - frozen pretrained word embeddings, optionally concatenated with character-level CNN features
//! - a bidirectional GRU encoder shared by the context and the question
//! - an attention layer between the context and the question: dot-product, bidirectional
//!   attention flow (BiDAF) or attention-over-attention (AoA)
//! - a bidirectional GRU modeling layer, optionally followed by self-attention
//! - a span head: independent softmax layers, an answer pointer network or the BiDAF output layer
//!
//! All padded positions are handled through masks (1 for real tokens, 0 for padding). Logits at
//! padded positions are pushed to a large negative value (`-1e30`) so that their probability is 0.
//!
//! ```no_run
//! # fn main() -> Result<(), rust_squad::RustSquadError> {
//! use rust_squad::squad::{AttentionVariant, OutputVariant, SquadConfig, SquadInput, SquadModel};
//! use tch::{nn, no_grad, Device, Kind, Tensor};
//!
//! let device = Device::Cpu;
//! let vs = nn::VarStore::new(device);
//! let config = SquadConfig {
//!     hidden_size: 100,
//!     attention: AttentionVariant::Bidaf,
//!     output: OutputVariant::BidafOut,
//!     ..Default::default()
//! };
//! let model = SquadModel::new(&vs.root(), &config)?;
//!
//! let input = SquadInput {
//!     context_ids: Tensor::of_slice(&[12i64, 5, 98, 7, 0, 0]).unsqueeze(0),
//!     context_mask: Tensor::of_slice(&[1i64, 1, 1, 1, 0, 0]).unsqueeze(0),
//!     context_char_ids: None,
//!     question_ids: Tensor::of_slice(&[44i64, 5, 0]).unsqueeze(0),
//!     question_mask: Tensor::of_slice(&[1i64, 1, 0]).unsqueeze(0),
//!     question_char_ids: None,
//! };
//! let output = no_grad(|| model.forward_t(&input, false))?;
//! # Ok(())
//! # }
//! ```

pub mod attention;
pub mod common;
pub mod encoder;
pub mod heads;
pub mod squad;

pub use common::error::RustSquadError;
pub use common::Config;
