//! Second order cone expressions, `||normed vector|| + affine`
use super::{AffineExpression, Assignment, LinearExpression, NormKind, NormedVector, VariableKind};
use crate::optimize::constraint::{ConstraintSense, RawConstraint};
use crate::robust_model::ModelError;

/// An optional norm term plus an affine part
///
/// Without the norm term the expression is purely affine.
#[derive(Debug, Clone, PartialEq)]
pub struct ConicExpression<V> {
    normed: Option<NormedVector<V>>,
    affine: AffineExpression<V>,
}

impl<V> Default for ConicExpression<V> {
    fn default() -> Self {
        Self {
            normed: None,
            affine: AffineExpression::default(),
        }
    }
}

impl<V: VariableKind> From<AffineExpression<V>> for ConicExpression<V> {
    fn from(affine: AffineExpression<V>) -> Self {
        Self {
            normed: None,
            affine,
        }
    }
}

impl<V: VariableKind> From<NormedVector<V>> for ConicExpression<V> {
    fn from(normed: NormedVector<V>) -> Self {
        Self {
            normed: Some(normed),
            affine: AffineExpression::new(),
        }
    }
}

impl<V: VariableKind> ConicExpression<V> {
    pub fn new(normed: Option<NormedVector<V>>, affine: AffineExpression<V>) -> Self {
        Self { normed, affine }
    }

    /// Norm of a vector of bare variables
    pub fn norm_of(variables: &[V], norm: NormKind) -> Self {
        NormedVector::norm_of(variables, norm).into()
    }

    pub fn is_affine(&self) -> bool {
        self.normed.is_none()
    }

    pub fn normed(&self) -> Option<&NormedVector<V>> {
        self.normed.as_ref()
    }

    pub fn affine(&self) -> &AffineExpression<V> {
        &self.affine
    }

    pub fn add_affine(mut self, other: &AffineExpression<V>) -> Self {
        self.affine = self.affine.add(other);
        self
    }

    pub fn add_linear(mut self, other: &LinearExpression<V>) -> Self {
        self.affine = self.affine.add_linear(other);
        self
    }

    pub fn add_constant(mut self, constant: f64) -> Self {
        self.affine = self.affine.add_constant(constant);
        self
    }

    /// Scale by a non-negative factor, the norm term absorbs the factor into its rows
    pub fn scale(mut self, factor: f64) -> Result<Self, ModelError> {
        if factor < 0. && self.normed.is_some() {
            return Err(ModelError::NegativeNormScale(factor));
        }
        self.normed = self.normed.map(|n| n.scale_rows(factor));
        self.affine = self.affine.scale(factor);
        Ok(self)
    }

    pub fn translate<W, F>(&self, mut map: F) -> Result<ConicExpression<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<W, ModelError>,
    {
        let normed = match &self.normed {
            Some(n) => Some(n.translate(&mut map)?),
            None => None,
        };
        Ok(ConicExpression::new(normed, self.affine.translate(&mut map)?))
    }

    pub fn substitute<W, F>(&self, mut map: F) -> Result<ConicExpression<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<AffineExpression<W>, ModelError>,
    {
        let normed = match &self.normed {
            Some(n) => Some(n.substitute(&mut map)?),
            None => None,
        };
        Ok(ConicExpression::new(normed, self.affine.substitute(&mut map)?))
    }

    pub fn value<A: Assignment<V> + ?Sized>(&self, assignment: &A) -> Result<f64, ModelError> {
        let normed = match &self.normed {
            Some(n) => n.value(assignment)?,
            None => 0.,
        };
        Ok(normed + self.affine.value(assignment)?)
    }

    pub fn lb(&self, context: &V::Context) -> Result<f64, ModelError> {
        let normed = match &self.normed {
            Some(n) => n.lb(context)?,
            None => 0.,
        };
        Ok(normed + self.affine.lb(context)?)
    }

    pub fn ub(&self, context: &V::Context) -> Result<f64, ModelError> {
        let normed = match &self.normed {
            Some(n) => n.ub(context)?,
            None => 0.,
        };
        Ok(normed + self.affine.ub(context)?)
    }

    pub fn to_string_with(&self, context: &V::Context) -> Result<String, ModelError> {
        match &self.normed {
            Some(n) => {
                if self.affine.is_zero() {
                    n.to_string_with(context)
                } else {
                    Ok(format!(
                        "{} + {}",
                        n.to_string_with(context)?,
                        self.affine.to_string_with(context)?
                    ))
                }
            }
            None => self.affine.to_string_with(context),
        }
    }

    // region Constraint Builders
    /// `self <= other`
    pub fn leq(&self, other: &AffineExpression<V>) -> RawConstraint<ConicExpression<V>> {
        RawConstraint::new(ConstraintSense::Leq, self.clone().add_affine(&other.negate()))
    }

    /// `self <= value`
    pub fn leq_value(&self, value: f64) -> RawConstraint<ConicExpression<V>> {
        RawConstraint::new(ConstraintSense::Leq, self.clone().add_constant(-value))
    }

    /// `self >= other`, only convex for affine expressions
    pub fn geq(&self, other: &AffineExpression<V>) -> RawConstraint<ConicExpression<V>> {
        RawConstraint::new(ConstraintSense::Geq, self.clone().add_affine(&other.negate()))
    }

    /// `self >= value`, only convex for affine expressions
    pub fn geq_value(&self, value: f64) -> RawConstraint<ConicExpression<V>> {
        RawConstraint::new(ConstraintSense::Geq, self.clone().add_constant(-value))
    }

    /// `self == other`, only convex for affine expressions
    pub fn equals(&self, other: &AffineExpression<V>) -> RawConstraint<ConicExpression<V>> {
        RawConstraint::new(ConstraintSense::Eq, self.clone().add_affine(&other.negate()))
    }

    /// `self == value`, only convex for affine expressions
    pub fn equals_value(&self, value: f64) -> RawConstraint<ConicExpression<V>> {
        RawConstraint::new(ConstraintSense::Eq, self.clone().add_constant(-value))
    }
    // endregion Constraint Builders
}

impl<V: VariableKind> From<RawConstraint<AffineExpression<V>>> for RawConstraint<ConicExpression<V>> {
    fn from(raw: RawConstraint<AffineExpression<V>>) -> Self {
        RawConstraint::new(raw.sense, raw.expression.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::linear::tests::TestVar;

    #[test]
    fn norm_plus_affine() {
        let vars = [TestVar(0), TestVar(1)];
        let expr = ConicExpression::norm_of(&vars, NormKind::Two)
            .add_affine(&AffineExpression::term(-1., TestVar(2)));
        assert!(!expr.is_affine());
        let values = [3., 4., 1.];
        assert!((expr.value(&values[..]).unwrap() - 4.).abs() < 1e-12);
        let bounds = [(-1., 1.), (-1., 1.), (0., 2.)];
        assert!((expr.lb(&bounds[..]).unwrap() + 2.).abs() < 1e-12);
        assert!((expr.ub(&bounds[..]).unwrap() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn negative_scaling_of_norms_is_rejected() {
        let expr = ConicExpression::norm_of(&[TestVar(0)], NormKind::One);
        if let Err(ModelError::NegativeNormScale(_)) = expr.clone().scale(-1.) {
            // Intentionally blank
        } else {
            panic!("Negative scaling of a norm accepted")
        }
        let doubled = expr.scale(2.).unwrap();
        let values = [-1.5];
        assert!((doubled.value(&values[..]).unwrap() - 3.).abs() < 1e-12);
    }

    #[test]
    fn constraint_from_affine() {
        let raw: RawConstraint<ConicExpression<TestVar>> =
            AffineExpression::variable(TestVar(0)).leq_value(1.).into();
        assert!(raw.expression.is_affine());
        assert_eq!(raw.sense, ConstraintSense::Leq);
    }
}
