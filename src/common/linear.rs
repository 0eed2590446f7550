// Copyright 2019 Laurent Mazare.
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

use std::borrow::Borrow;
use tch::nn::{Init, Module, Path};
use tch::Tensor;

/// Glorot/Xavier uniform initialization for a weight with the given fan-in and fan-out.
pub fn xavier_uniform(fan_in: i64, fan_out: i64) -> Init {
    let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Init::Uniform {
        lo: -bound,
        up: bound,
    }
}

/// Projection of the last dimension onto a single learned vector, dropping that dimension:
/// `(..., dim)` -> `(...)`.
#[derive(Debug)]
pub struct VectorProjection {
    pub ws: Tensor,
}

pub fn vector_projection<'a, T: Borrow<Path<'a>>>(vs: T, name: &str, dim: i64) -> VectorProjection {
    let vs = vs.borrow();
    VectorProjection {
        ws: vs.var(name, &[dim], xavier_uniform(dim, 1)),
    }
}

impl Module for VectorProjection {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.matmul(&self.ws)
    }
}

#[derive(Debug)]
pub struct LinearNoBias {
    pub ws: Tensor,
}

pub fn linear_no_bias<'a, T: Borrow<Path<'a>>>(vs: T, in_dim: i64, out_dim: i64) -> LinearNoBias {
    let vs = vs.borrow();
    LinearNoBias {
        ws: vs.var("weight", &[out_dim, in_dim], xavier_uniform(in_dim, out_dim)),
    }
}

impl Module for LinearNoBias {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.matmul(&self.ws.tr())
    }
}
