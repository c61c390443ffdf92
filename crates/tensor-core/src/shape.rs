// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Declared value shapes.
//!
//! A declared shape may mix fixed extents with symbolic dimensions
//! (`token_len`, `batch_size`) and fully unknown ones. An empty dimension
//! list is a rank-0 (scalar) declaration, which is distinct from a value
//! whose rank is not declared at all; callers model the latter as
//! `Option<Shape>::None`.

use std::fmt;

/// A single declared dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    /// A fixed extent.
    Fixed(i64),
    /// A named dynamic extent.
    Symbolic(String),
    /// A dimension with neither a value nor a name.
    Unknown,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(v) => write!(f, "{v}"),
            Dim::Symbolic(name) => f.write_str(name),
            Dim::Unknown => f.write_str("?"),
        }
    }
}

/// The declared dimensions of a graph value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<Dim>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Dim, Shape};
    /// let s = Shape::new(vec![Dim::Fixed(1), Dim::Symbolic("token_len".into())]);
    /// assert_eq!(s.rank(), 2);
    /// assert_eq!(s.to_string(), "[1, token_len]");
    /// ```
    pub fn new(dims: Vec<Dim>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a shape whose dimensions are all fixed.
    pub fn fixed(dims: &[i64]) -> Self {
        Self {
            dims: dims.iter().copied().map(Dim::Fixed).collect(),
        }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns `true` for a rank-0 declaration.
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    /// Returns `true` if any dimension is symbolic or unknown.
    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|d| !matches!(d, Dim::Fixed(_)))
    }

    /// Total element count, when every dimension is fixed and non-negative.
    ///
    /// A scalar has one element.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, d| match d {
            Dim::Fixed(v) => usize::try_from(*v).ok().and_then(|v| acc.checked_mul(v)),
            _ => None,
        })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}
