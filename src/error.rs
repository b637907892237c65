//! Error types for acceleration-structure construction.

use std::fmt;

/// Errors that can occur while building an [`crate::AccelerationStructure`].
///
/// Queries never fail; all error surface is at build time.
#[derive(Debug, Clone)]
pub enum BuildError {
    /// Malformed input: a non-finite coordinate, an out-of-range or repeated
    /// triangle index, a mismatched flat-array length, or a non-positive
    /// `limit_cube_len`.
    InvalidInput(String),

    /// A triangle whose normal fails to normalize (collinear corners) or an
    /// edge of zero length, including ones produced by merging bit-identical
    /// duplicate vertices.
    DegenerateGeometry { face: usize, message: String },

    /// Internal Voronoi cell construction failure.
    /// This should not happen with valid input and indicates a bug.
    CellConstruction(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::InvalidInput(msg) => {
                write!(f, "invalid input: {}", msg)
            }
            BuildError::DegenerateGeometry { face, message } => {
                write!(f, "degenerate geometry in triangle {}: {}", face, message)
            }
            BuildError::CellConstruction(msg) => {
                write!(f, "cell construction failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for BuildError {}
