//! Linear expressions plus a constant
use super::{Assignment, LinearExpression, VariableKind};
use crate::optimize::constraint::{ConstraintSense, RawConstraint};
use crate::robust_model::ModelError;

/// `linear + constant`
#[derive(Debug, Clone, PartialEq)]
pub struct AffineExpression<V> {
    constant: f64,
    linear: LinearExpression<V>,
}

impl<V> Default for AffineExpression<V> {
    fn default() -> Self {
        Self {
            constant: 0.,
            linear: LinearExpression::default(),
        }
    }
}

impl<V: VariableKind> AffineExpression<V> {
    /// Create a zero expression
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(constant: f64, linear: LinearExpression<V>) -> Self {
        Self { constant, linear }
    }

    /// Constant expression
    pub fn constant_value(constant: f64) -> Self {
        Self {
            constant,
            linear: LinearExpression::new(),
        }
    }

    /// A single variable with coefficient 1
    pub fn variable(variable: V) -> Self {
        Self::from_parts(0., LinearExpression::variable(variable))
    }

    /// A single scaled variable
    pub fn term(scale: f64, variable: V) -> Self {
        Self::from_parts(0., LinearExpression::term(scale, variable))
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn linear(&self) -> &LinearExpression<V> {
        &self.linear
    }

    /// Whether the expression has no variable terms
    pub fn is_constant(&self) -> bool {
        self.linear.is_zero()
    }

    /// Whether the expression is identically zero
    pub fn is_zero(&self) -> bool {
        self.constant == 0. && self.linear.is_zero()
    }

    pub fn add(mut self, other: &AffineExpression<V>) -> Self {
        self.constant += other.constant;
        self.linear = self.linear.add(&other.linear);
        self
    }

    pub fn add_linear(mut self, other: &LinearExpression<V>) -> Self {
        self.linear = self.linear.add(other);
        self
    }

    pub fn add_term(mut self, scale: f64, variable: V) -> Self {
        self.linear.push(scale, variable);
        self
    }

    pub fn add_constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    pub fn sub(self, other: &AffineExpression<V>) -> Self {
        self.add(&other.negate())
    }

    pub fn scale(mut self, factor: f64) -> Self {
        self.constant *= factor;
        self.linear = self.linear.scale(factor);
        self
    }

    pub fn negate(&self) -> Self {
        self.clone().scale(-1.)
    }

    /// Merge repeated variables and drop zero coefficients
    pub fn simplify(&self) -> Self {
        Self::from_parts(self.constant, self.linear.simplify())
    }

    /// Replace every variable by another one, keeping coefficients
    pub fn translate<W, F>(&self, map: F) -> Result<AffineExpression<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<W, ModelError>,
    {
        Ok(AffineExpression::from_parts(
            self.constant,
            self.linear.translate(map)?,
        ))
    }

    /// Replace every variable by an affine expression in another variable kind
    pub fn substitute<W, F>(&self, map: F) -> Result<AffineExpression<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<AffineExpression<W>, ModelError>,
    {
        Ok(self.linear.substitute(map)?.add_constant(self.constant))
    }

    pub fn value<A: Assignment<V> + ?Sized>(&self, assignment: &A) -> Result<f64, ModelError> {
        Ok(self.constant + self.linear.value(assignment)?)
    }

    pub fn lb(&self, context: &V::Context) -> Result<f64, ModelError> {
        Ok(self.constant + self.linear.lb(context)?)
    }

    pub fn ub(&self, context: &V::Context) -> Result<f64, ModelError> {
        Ok(self.constant + self.linear.ub(context)?)
    }

    pub fn to_string_with(&self, context: &V::Context) -> Result<String, ModelError> {
        if self.linear.is_empty() {
            return Ok(self.constant.to_string());
        }
        let linear = self.linear.to_string_with(context)?;
        if self.constant == 0. {
            Ok(linear)
        } else {
            Ok(format!("{} + {}", linear, self.constant))
        }
    }

    // region Constraint Builders
    /// `self <= other`, stored as `self - other <= 0`
    pub fn leq(&self, other: &AffineExpression<V>) -> RawConstraint<AffineExpression<V>> {
        RawConstraint::new(ConstraintSense::Leq, self.clone().sub(other))
    }

    /// `self >= other`, stored as `self - other >= 0`
    pub fn geq(&self, other: &AffineExpression<V>) -> RawConstraint<AffineExpression<V>> {
        RawConstraint::new(ConstraintSense::Geq, self.clone().sub(other))
    }

    /// `self == other`, stored as `self - other == 0`
    pub fn equals(&self, other: &AffineExpression<V>) -> RawConstraint<AffineExpression<V>> {
        RawConstraint::new(ConstraintSense::Eq, self.clone().sub(other))
    }

    /// `self <= value`
    pub fn leq_value(&self, value: f64) -> RawConstraint<AffineExpression<V>> {
        self.leq(&AffineExpression::constant_value(value))
    }

    /// `self >= value`
    pub fn geq_value(&self, value: f64) -> RawConstraint<AffineExpression<V>> {
        self.geq(&AffineExpression::constant_value(value))
    }

    /// `self == value`
    pub fn equals_value(&self, value: f64) -> RawConstraint<AffineExpression<V>> {
        self.equals(&AffineExpression::constant_value(value))
    }
    // endregion Constraint Builders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::linear::tests::TestVar;

    #[test]
    fn arithmetic() {
        let expr = AffineExpression::variable(TestVar(0))
            .add_constant(2.)
            .add(&AffineExpression::term(3., TestVar(1)))
            .scale(2.);
        assert!((expr.constant() - 4.).abs() < 1e-12);
        assert!((expr.linear().coefficient(&TestVar(1)) - 6.).abs() < 1e-12);
        let values = [1., 1.];
        assert!((expr.value(&values[..]).unwrap() - 12.).abs() < 1e-12);
        assert!(expr.clone().sub(&expr).simplify().is_zero());
    }

    #[test]
    fn bounds() {
        let expr = AffineExpression::term(-1., TestVar(0)).add_constant(1.);
        let bounds = [(-1., 1.)];
        assert!((expr.lb(&bounds[..]).unwrap() - 0.).abs() < 1e-12);
        assert!((expr.ub(&bounds[..]).unwrap() - 2.).abs() < 1e-12);
    }

    #[test]
    fn constraint_builders_move_everything_left() {
        let x = AffineExpression::variable(TestVar(0));
        let constraint = x.leq_value(3.);
        assert_eq!(constraint.sense, ConstraintSense::Leq);
        assert!((constraint.expression.constant() + 3.).abs() < 1e-12);
        let constraint = x.geq(&AffineExpression::term(2., TestVar(1)));
        assert_eq!(constraint.sense, ConstraintSense::Geq);
        assert!((constraint.expression.linear().coefficient(&TestVar(1)) + 2.).abs() < 1e-12);
    }
}
