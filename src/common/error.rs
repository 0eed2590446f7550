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

use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RustSquadError {
    #[error("Shape mismatch error: {0}")]
    ShapeMismatch(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Invalid input error: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration parsing error: {0}")]
    ParseError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),
}

impl From<std::io::Error> for RustSquadError {
    fn from(error: std::io::Error) -> Self {
        RustSquadError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for RustSquadError {
    fn from(error: serde_json::Error) -> Self {
        RustSquadError::ParseError(error.to_string())
    }
}

impl From<TchError> for RustSquadError {
    fn from(error: TchError) -> Self {
        RustSquadError::TchError(error.to_string())
    }
}
