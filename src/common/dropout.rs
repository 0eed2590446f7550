// Copyright 2019 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use tch::nn::ModuleT;
use tch::Tensor;

/// Dropout parametrized by the probability of *keeping* an activation.
/// Acts as the identity when `train` is false.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    keep_prob: f64,
}

impl Dropout {
    pub fn from_keep_prob(keep_prob: f64) -> Dropout {
        Dropout { keep_prob }
    }
}

impl ModuleT for Dropout {
    fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        if self.keep_prob >= 1.0 {
            return input.shallow_clone();
        }
        input.dropout(1.0 - self.keep_prob, train)
    }
}
