//! # Sequence and character encoders
//!
//! - `SequenceEncoder`: bidirectional GRU producing a (batch, sequence_length, 2 x hidden_size)
//!   representation of a padded sequence. One instance per set of weights: reuse the instance to
//!   tie weights (context and question), build another one under a different path for an
//!   independent encoder.
//! - `CharacterEncoder`: convolutional encoder turning the characters of every word into a
//!   fixed-width vector, concatenated to the word embeddings when character features are enabled.

mod char_cnn;
mod rnn;

pub use char_cnn::CharacterEncoder;
pub use rnn::SequenceEncoder;

pub(crate) use rnn::unroll_gru;
