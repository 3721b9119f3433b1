//! Linear, affine and conic expressions generic over the kind of variable they reference
//!
//! All expression types are plain values. They are built through explicit methods
//! (`add`, `scale`, `leq`, ...) instead of operator overloading, and every operation returns a
//! new value of the same family.

pub mod affine;
pub mod conic;
pub mod linear;
pub mod normed;
pub mod ro;

use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::robust_model::ModelError;
use crate::utils::store::Index;

pub use affine::AffineExpression;
pub use conic::ConicExpression;
pub use linear::{LinearExpression, ScaledVariable};
pub use normed::NormedVector;
pub use ro::{RoExpression, UncertaintyMode};

/// Bound value meaning "no lower bound"
pub const NO_LOWER_BOUND: f64 = f64::NEG_INFINITY;
/// Bound value meaning "no upper bound"
pub const NO_UPPER_BOUND: f64 = f64::INFINITY;

/// A kind of variable that expressions can reference
///
/// The context is whatever owns the variables, it is needed to look up bounds and names.
pub trait VariableKind: Copy + Eq + Hash + Debug {
    type Context: ?Sized;

    /// Lower and upper bound of the variable
    fn bounds(&self, context: &Self::Context) -> Result<(f64, f64), ModelError>;

    /// Human-readable name used when printing expressions
    fn label(&self, context: &Self::Context) -> Result<String, ModelError>;
}

/// Anything that can provide a value for variables of kind `V`
pub trait Assignment<V> {
    fn value_of(&self, variable: &V) -> Result<f64, ModelError>;
}

// Plain value vectors are indexed by the variable's slot
impl<T> Assignment<Index<T>> for [f64] {
    fn value_of(&self, variable: &Index<T>) -> Result<f64, ModelError> {
        Ok(*variable.lookup(self)?)
    }
}

impl<T> Assignment<Index<T>> for Vec<f64> {
    fn value_of(&self, variable: &Index<T>) -> Result<f64, ModelError> {
        Ok(*variable.lookup(self)?)
    }
}

/// Norm applied to a normed vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormKind {
    One,
    Two,
    Infinity,
}

impl NormKind {
    /// The norm whose unit ball is the polar of this norm's unit ball
    pub fn dual(&self) -> NormKind {
        match self {
            NormKind::One => NormKind::Infinity,
            NormKind::Two => NormKind::Two,
            NormKind::Infinity => NormKind::One,
        }
    }

    /// Apply the norm to a slice of values
    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            NormKind::One => values.iter().map(|v| v.abs()).sum(),
            NormKind::Two => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
            NormKind::Infinity => values.iter().fold(0f64, |acc, v| acc.max(v.abs())),
        }
    }
}

impl Display for NormKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NormKind::One => write!(f, "1"),
            NormKind::Two => write!(f, "2"),
            NormKind::Infinity => write!(f, "inf"),
        }
    }
}

/// Interval of `scale * [lb, ub]`, a zero scale yields `[0, 0]` even for unbounded variables
pub(crate) fn scaled_interval(scale: f64, lb: f64, ub: f64) -> (f64, f64) {
    if scale == 0. {
        (0., 0.)
    } else if scale > 0. {
        (scale * lb, scale * ub)
    } else {
        (scale * ub, scale * lb)
    }
}

/// Format a coefficient/label pair the way expressions print their terms
pub(crate) fn format_term(scale: f64, label: &str) -> String {
    if scale == 1. {
        label.to_string()
    } else if scale == -1. {
        format!("-{}", label)
    } else {
        format!("{}*{}", scale, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_norms() {
        assert_eq!(NormKind::One.dual(), NormKind::Infinity);
        assert_eq!(NormKind::Infinity.dual(), NormKind::One);
        assert_eq!(NormKind::Two.dual(), NormKind::Two);
    }

    #[test]
    fn apply_norms() {
        let values = [3., -4.];
        assert!((NormKind::One.apply(&values) - 7.).abs() < 1e-12);
        assert!((NormKind::Two.apply(&values) - 5.).abs() < 1e-12);
        assert!((NormKind::Infinity.apply(&values) - 4.).abs() < 1e-12);
    }

    #[test]
    fn intervals_with_unbounded_variables() {
        assert_eq!(scaled_interval(0., NO_LOWER_BOUND, NO_UPPER_BOUND), (0., 0.));
        assert_eq!(scaled_interval(-2., 1., 3.), (-6., -2.));
        assert_eq!(scaled_interval(2., 1., NO_UPPER_BOUND), (2., f64::INFINITY));
    }
}
