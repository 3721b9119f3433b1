//! Provides struct for representing an optimization problem's objective
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::robust_model::ModelError;

/// Represents the Objective of an optimization problem
///
/// Generic over the expression type, robust models use [`crate::expression::RoExpression`] and
/// conic models use affine expressions of conic variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective<E> {
    /// Sense of the objective (maximize, or minimize), see [`ObjectiveSense`]
    sense: ObjectiveSense,
    /// Expression to optimize
    expression: E,
    /// Value of the objective at the last solution
    value: Option<f64>,
}

impl<E> Objective<E> {
    /// Create a new objective with a given sense
    pub fn new(sense: ObjectiveSense, expression: E) -> Self {
        Self {
            sense,
            expression,
            value: None,
        }
    }

    /// Create a new maximization objective
    pub fn maximize(expression: E) -> Self {
        Self::new(ObjectiveSense::Maximize, expression)
    }

    /// Create a new minimization objective
    pub fn minimize(expression: E) -> Self {
        Self::new(ObjectiveSense::Minimize, expression)
    }

    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Change the sense of the objective
    pub fn set_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }

    pub fn expression(&self) -> &E {
        &self.expression
    }

    /// Value of the objective at the last solution
    pub fn value(&self) -> Result<f64, ModelError> {
        self.value
            .ok_or_else(|| ModelError::MissingSolution("objective value".to_string()))
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = Some(value);
    }

    pub fn invalidate_value(&mut self) {
        self.value = None;
    }
}

/// Represents the sense of the objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectiveSense {
    /// Objective should be minimized
    Minimize,
    /// Objective should be maximized
    Maximize,
}

impl ObjectiveSense {
    /// `1` for minimization, `-1` for maximization
    pub fn sign(&self) -> f64 {
        match self {
            ObjectiveSense::Minimize => 1.,
            ObjectiveSense::Maximize => -1.,
        }
    }

    pub fn opposite(&self) -> ObjectiveSense {
        match self {
            ObjectiveSense::Minimize => ObjectiveSense::Maximize,
            ObjectiveSense::Maximize => ObjectiveSense::Minimize,
        }
    }
}

impl Display for ObjectiveSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectiveSense::Minimize => write!(f, "MIN"),
            ObjectiveSense::Maximize => write!(f, "MAX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objective_sense() {
        let mut objective = Objective::minimize(1.0);
        assert_eq!(objective.sense(), ObjectiveSense::Minimize);
        objective.set_sense(ObjectiveSense::Maximize);
        assert_eq!(objective.sense(), ObjectiveSense::Maximize);
        assert!((ObjectiveSense::Maximize.sign() + 1.).abs() < 1e-25);
        assert_eq!(ObjectiveSense::Minimize.opposite(), ObjectiveSense::Maximize);
    }

    #[test]
    fn objective_value() {
        let mut objective = Objective::maximize(());
        assert!(objective.value().is_err());
        objective.set_value(2.5);
        assert!((objective.value().unwrap() - 2.5).abs() < 1e-25);
        objective.invalidate_value();
        assert!(objective.value().is_err());
    }
}
