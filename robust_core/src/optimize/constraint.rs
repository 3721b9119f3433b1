//! Provides structs for representing constraints of robust and conic models
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::expression::{Assignment, ConicExpression, RoExpression, VariableKind};
use crate::optimize::variable::ConicRef;
use crate::robust_model::decision::DecisionRef;
use crate::robust_model::uncertainty::{UncertaintyRef, UncertaintyScaledDecision};
use crate::robust_model::ModelError;

/// Relation between a constraint expression and zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintSense {
    /// `expression <= 0`
    Leq,
    /// `expression >= 0`
    Geq,
    /// `expression == 0`
    Eq,
}

impl ConstraintSense {
    /// Lower bound of the dual variable associated with a constraint of this sense
    pub fn dual_lb(&self) -> f64 {
        match self {
            ConstraintSense::Leq => 0.,
            ConstraintSense::Geq | ConstraintSense::Eq => f64::NEG_INFINITY,
        }
    }

    /// Upper bound of the dual variable associated with a constraint of this sense
    pub fn dual_ub(&self) -> f64 {
        match self {
            ConstraintSense::Geq => 0.,
            ConstraintSense::Leq | ConstraintSense::Eq => f64::INFINITY,
        }
    }

    /// Whether a value of the constraint expression satisfies the sense up to a tolerance
    pub fn holds(&self, value: f64, tolerance: f64) -> bool {
        match self {
            ConstraintSense::Leq => value <= tolerance,
            ConstraintSense::Geq => value >= -tolerance,
            ConstraintSense::Eq => value.abs() <= tolerance,
        }
    }
}

impl Display for ConstraintSense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintSense::Leq => write!(f, "<="),
            ConstraintSense::Geq => write!(f, ">="),
            ConstraintSense::Eq => write!(f, "=="),
        }
    }
}

/// An expression with a sense but no name yet, `expression sense 0`
#[derive(Debug, Clone, PartialEq)]
pub struct RawConstraint<E> {
    pub sense: ConstraintSense,
    pub expression: E,
}

impl<E> RawConstraint<E> {
    pub fn new(sense: ConstraintSense, expression: E) -> Self {
        Self { sense, expression }
    }

    /// Give the constraint a name
    pub fn named(self, name: impl Into<String>) -> Constraint<E> {
        Constraint::new(name, self)
    }
}

/// A named constraint `expression sense 0`, optionally carrying its dual value after a solve
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint<E> {
    name: String,
    sense: ConstraintSense,
    expression: E,
    dual_value: Option<f64>,
}

impl<E> Constraint<E> {
    pub fn new(name: impl Into<String>, raw: RawConstraint<E>) -> Self {
        Self {
            name: name.into(),
            sense: raw.sense,
            expression: raw.expression,
            dual_value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> ConstraintSense {
        self.sense
    }

    pub fn expression(&self) -> &E {
        &self.expression
    }

    pub fn dual_lb(&self) -> f64 {
        self.sense.dual_lb()
    }

    pub fn dual_ub(&self) -> f64 {
        self.sense.dual_ub()
    }

    pub fn has_dual_value(&self) -> bool {
        self.dual_value.is_some()
    }

    /// Dual value of the last solve
    pub fn dual_value(&self) -> Result<f64, ModelError> {
        self.dual_value
            .ok_or_else(|| ModelError::MissingSolution(format!("dual of {}", self.name)))
    }

    pub fn set_dual_value(&mut self, value: f64) {
        self.dual_value = Some(value);
    }

    pub fn invalidate_dual_value(&mut self) {
        self.dual_value = None;
    }
}

impl<V: VariableKind> Constraint<ConicExpression<V>> {
    /// Whether the assignment satisfies the constraint up to the tolerance
    pub fn feasible<A: Assignment<V> + ?Sized>(
        &self,
        assignment: &A,
        tolerance: f64,
    ) -> Result<bool, ModelError> {
        Ok(self.sense.holds(self.expression.value(assignment)?, tolerance))
    }

    /// Whether the assignment satisfies the constraint exactly
    pub fn constraint_satisfied<A: Assignment<V> + ?Sized>(
        &self,
        assignment: &A,
    ) -> Result<bool, ModelError> {
        self.feasible(assignment, 0.)
    }

    /// Whether the constraint only bounds a single variable
    pub fn is_variable_bound(&self) -> bool {
        self.expression.is_affine() && self.expression.affine().linear().simplify().len() == 1
    }

    pub fn to_string_with(&self, context: &V::Context) -> Result<String, ModelError> {
        Ok(format!(
            "{}: {} {} 0",
            self.name,
            self.expression.to_string_with(context)?,
            self.sense
        ))
    }
}

impl Constraint<ConicExpression<ConicRef>> {
    /// Whether the constraint is affine, i.e. a plain linear row
    pub fn is_affine(&self) -> bool {
        self.expression.is_affine()
    }
}

impl Constraint<RoExpression> {
    /// Whether a full realization satisfies the constraint up to the tolerance
    pub fn feasible<A>(&self, assignment: &A, tolerance: f64) -> Result<bool, ModelError>
    where
        A: Assignment<DecisionRef>
            + Assignment<UncertaintyRef>
            + Assignment<UncertaintyScaledDecision>
            + ?Sized,
    {
        Ok(self.sense.holds(self.expression.value(assignment)?, tolerance))
    }
}

/// Set of conic variables of which at most one may be non-zero
#[derive(Debug, Clone, PartialEq)]
pub struct SosConstraint {
    variables: Vec<ConicRef>,
}

impl SosConstraint {
    pub fn new(variables: Vec<ConicRef>) -> Self {
        Self { variables }
    }

    pub fn variables(&self) -> &[ConicRef] {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::linear::tests::TestVar;
    use crate::expression::{AffineExpression, NormKind};

    #[test]
    fn dual_bounds_by_sense() {
        assert_eq!(ConstraintSense::Geq.dual_lb(), f64::NEG_INFINITY);
        assert!((ConstraintSense::Geq.dual_ub()).abs() < 1e-25);
        assert!((ConstraintSense::Leq.dual_lb()).abs() < 1e-25);
        assert_eq!(ConstraintSense::Leq.dual_ub(), f64::INFINITY);
        assert_eq!(ConstraintSense::Eq.dual_lb(), f64::NEG_INFINITY);
        assert_eq!(ConstraintSense::Eq.dual_ub(), f64::INFINITY);
    }

    #[test]
    fn feasibility_with_tolerance() {
        let constraint: Constraint<ConicExpression<TestVar>> =
            RawConstraint::from(AffineExpression::variable(TestVar(0)).leq_value(1.)).named("c");
        let inside = [0.5];
        let barely = [1.0005];
        assert!(constraint.constraint_satisfied(&inside[..]).unwrap());
        assert!(!constraint.constraint_satisfied(&barely[..]).unwrap());
        assert!(constraint.feasible(&barely[..], 1e-3).unwrap());
        assert!(constraint.is_variable_bound());
    }

    #[test]
    fn norm_constraints_are_not_bounds() {
        let constraint = ConicExpression::norm_of(&[TestVar(0)], NormKind::Two)
            .leq_value(1.)
            .named("ball");
        assert!(!constraint.is_variable_bound());
        let values = [-2.];
        assert!(!constraint.constraint_satisfied(&values[..]).unwrap());
    }

    #[test]
    fn dual_values() {
        let mut constraint = AffineExpression::variable(TestVar(0)).geq_value(0.).named("c");
        assert!(constraint.dual_value().is_err());
        constraint.set_dual_value(-1.5);
        assert!((constraint.dual_value().unwrap() + 1.5).abs() < 1e-25);
        constraint.invalidate_dual_value();
        assert!(!constraint.has_dual_value());
    }
}
