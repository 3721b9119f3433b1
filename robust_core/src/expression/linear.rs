//! Scaled variables and sums of them
use std::collections::HashMap;
use std::fmt::Write;

use super::{format_term, scaled_interval, AffineExpression, Assignment, VariableKind};
use crate::robust_model::ModelError;

/// A variable multiplied by a constant coefficient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledVariable<V> {
    pub scale: f64,
    pub variable: V,
}

impl<V: VariableKind> ScaledVariable<V> {
    pub fn new(scale: f64, variable: V) -> Self {
        Self { scale, variable }
    }

    pub fn value<A: Assignment<V> + ?Sized>(&self, assignment: &A) -> Result<f64, ModelError> {
        Ok(self.scale * assignment.value_of(&self.variable)?)
    }

    /// Interval the scaled variable can take given its variable's bounds
    pub fn bounds(&self, context: &V::Context) -> Result<(f64, f64), ModelError> {
        let (lb, ub) = self.variable.bounds(context)?;
        Ok(scaled_interval(self.scale, lb, ub))
    }
}

/// Sum of scaled variables
///
/// Terms are kept in insertion order and the same variable may occur several times, an empty
/// expression is identically zero. Use [`LinearExpression::simplify`] to merge repeated terms.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearExpression<V> {
    terms: Vec<ScaledVariable<V>>,
}

impl<V> Default for LinearExpression<V> {
    fn default() -> Self {
        Self { terms: Vec::new() }
    }
}

impl<V: VariableKind> LinearExpression<V> {
    /// Create an empty (zero) expression
    pub fn new() -> Self {
        Self::default()
    }

    /// Expression consisting of a single variable with coefficient 1
    pub fn variable(variable: V) -> Self {
        Self::term(1., variable)
    }

    /// Expression consisting of a single scaled variable
    pub fn term(scale: f64, variable: V) -> Self {
        Self {
            terms: vec![ScaledVariable::new(scale, variable)],
        }
    }

    pub fn from_terms(terms: Vec<ScaledVariable<V>>) -> Self {
        Self { terms }
    }

    /// Sum of the given variables, each with coefficient 1
    pub fn sum(variables: &[V]) -> Self {
        Self {
            terms: variables.iter().map(|v| ScaledVariable::new(1., *v)).collect(),
        }
    }

    /// Weighted sum of variables, extra coefficients or variables are ignored
    pub fn weighted(variables: &[V], coefficients: &[f64]) -> Self {
        Self {
            terms: variables
                .iter()
                .zip(coefficients)
                .map(|(v, c)| ScaledVariable::new(*c, *v))
                .collect(),
        }
    }

    pub fn terms(&self) -> &[ScaledVariable<V>] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether every coefficient is zero after merging repeated variables
    pub fn is_zero(&self) -> bool {
        self.simplify().is_empty()
    }

    /// Append a scaled variable
    pub fn add_term(mut self, scale: f64, variable: V) -> Self {
        self.terms.push(ScaledVariable::new(scale, variable));
        self
    }

    /// In place version of [`LinearExpression::add_term`]
    pub fn push(&mut self, scale: f64, variable: V) {
        self.terms.push(ScaledVariable::new(scale, variable));
    }

    pub fn add(mut self, other: &LinearExpression<V>) -> Self {
        self.terms.extend_from_slice(&other.terms);
        self
    }

    pub fn sub(self, other: &LinearExpression<V>) -> Self {
        self.add(&other.negate())
    }

    pub fn scale(mut self, factor: f64) -> Self {
        self.terms.iter_mut().for_each(|t| t.scale *= factor);
        self
    }

    pub fn negate(&self) -> Self {
        self.clone().scale(-1.)
    }

    /// Merge repeated variables and drop zero coefficients, first occurrence order is kept
    pub fn simplify(&self) -> Self {
        let mut positions: HashMap<V, usize> = HashMap::new();
        let mut merged: Vec<ScaledVariable<V>> = Vec::new();
        for term in &self.terms {
            match positions.get(&term.variable) {
                Some(&pos) => merged[pos].scale += term.scale,
                None => {
                    positions.insert(term.variable, merged.len());
                    merged.push(*term);
                }
            }
        }
        Self {
            terms: merged.into_iter().filter(|t| t.scale != 0.).collect(),
        }
    }

    /// Total coefficient of a variable
    pub fn coefficient(&self, variable: &V) -> f64 {
        self.terms
            .iter()
            .filter(|t| t.variable == *variable)
            .map(|t| t.scale)
            .sum()
    }

    /// Replace every variable by another one, keeping coefficients
    pub fn translate<W, F>(&self, mut map: F) -> Result<LinearExpression<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<W, ModelError>,
    {
        let mut terms = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            terms.push(ScaledVariable::new(term.scale, map(&term.variable)?));
        }
        Ok(LinearExpression { terms })
    }

    /// Replace every variable by an affine expression in another variable kind
    pub fn substitute<W, F>(&self, mut map: F) -> Result<AffineExpression<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<AffineExpression<W>, ModelError>,
    {
        let mut result = AffineExpression::new();
        for term in &self.terms {
            result = result.add(&map(&term.variable)?.scale(term.scale));
        }
        Ok(result)
    }

    /// Evaluate the expression
    pub fn value<A: Assignment<V> + ?Sized>(&self, assignment: &A) -> Result<f64, ModelError> {
        let mut total = 0.;
        for term in &self.terms {
            total += term.value(assignment)?;
        }
        Ok(total)
    }

    /// Smallest value given the variable bounds
    pub fn lb(&self, context: &V::Context) -> Result<f64, ModelError> {
        let mut total = 0.;
        for term in &self.terms {
            total += term.bounds(context)?.0;
        }
        Ok(total)
    }

    /// Largest value given the variable bounds
    pub fn ub(&self, context: &V::Context) -> Result<f64, ModelError> {
        let mut total = 0.;
        for term in &self.terms {
            total += term.bounds(context)?.1;
        }
        Ok(total)
    }

    /// Render the expression with variable names from the context
    pub fn to_string_with(&self, context: &V::Context) -> Result<String, ModelError> {
        if self.terms.is_empty() {
            return Ok("0".to_string());
        }
        let mut s = String::new();
        for (i, term) in self.terms.iter().enumerate() {
            let label = term.variable.label(context)?;
            if i > 0 {
                s.push_str(" + ");
            }
            let _ = write!(s, "{}", format_term(term.scale, &label));
        }
        Ok(s)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal variable kind for exercising the algebra, the context is a table of bounds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct TestVar(pub usize);

    impl VariableKind for TestVar {
        type Context = [(f64, f64)];

        fn bounds(&self, context: &Self::Context) -> Result<(f64, f64), ModelError> {
            context.get(self.0).copied().ok_or(ModelError::MissingSolution(format!("v{}", self.0)))
        }

        fn label(&self, _context: &Self::Context) -> Result<String, ModelError> {
            Ok(format!("v{}", self.0))
        }
    }

    impl Assignment<TestVar> for [f64] {
        fn value_of(&self, variable: &TestVar) -> Result<f64, ModelError> {
            self.get(variable.0)
                .copied()
                .ok_or(ModelError::MissingSolution(format!("v{}", variable.0)))
        }
    }

    #[test]
    fn simplify_merges_terms() {
        let expr = LinearExpression::variable(TestVar(0))
            .add_term(2., TestVar(1))
            .add_term(-1., TestVar(0));
        assert_eq!(expr.len(), 3);
        let simplified = expr.simplify();
        assert_eq!(simplified.len(), 1);
        assert_eq!(simplified.terms()[0].variable, TestVar(1));
        assert!(LinearExpression::variable(TestVar(0))
            .sub(&LinearExpression::variable(TestVar(0)))
            .is_zero());
    }

    #[test]
    fn value_and_bounds() {
        let expr = LinearExpression::weighted(&[TestVar(0), TestVar(1)], &[2., -3.]);
        let values = [1.5, 2.];
        assert!((expr.value(&values[..]).unwrap() - (-3.)).abs() < 1e-12);
        let bounds = [(0., 1.), (-1., 2.)];
        assert!((expr.lb(&bounds[..]).unwrap() - (-6.)).abs() < 1e-12);
        assert!((expr.ub(&bounds[..]).unwrap() - 5.).abs() < 1e-12);
    }

    #[test]
    fn translate_and_substitute() {
        let expr = LinearExpression::sum(&[TestVar(0), TestVar(1)]).scale(2.);
        let moved = expr.translate(|v| Ok(TestVar(v.0 + 1))).unwrap();
        assert_eq!(moved.terms()[1].variable, TestVar(2));
        let substituted = expr
            .substitute(|v| Ok(AffineExpression::variable(TestVar(v.0)).add_constant(1.)))
            .unwrap();
        assert!((substituted.constant() - 4.).abs() < 1e-12);
        assert!((substituted.linear().coefficient(&TestVar(1)) - 2.).abs() < 1e-12);
    }

    #[test]
    fn printing() {
        let expr = LinearExpression::variable(TestVar(0)).add_term(-2., TestVar(1));
        let bounds = [(0., 1.), (0., 1.)];
        assert_eq!(expr.to_string_with(&bounds[..]).unwrap(), "v0 + -2*v1");
        assert_eq!(
            LinearExpression::<TestVar>::new().to_string_with(&bounds[..]).unwrap(),
            "0"
        );
    }
}
