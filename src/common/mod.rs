pub mod config;
pub(crate) mod dropout;
pub mod error;
pub(crate) mod linear;
pub mod masking;

pub use config::Config;
