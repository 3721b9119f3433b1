//! Norms of vectors of affine expressions
use super::{AffineExpression, Assignment, NormKind, VariableKind};
use crate::robust_model::ModelError;

/// `|| (row_1, ..., row_m) ||` for the given norm kind
#[derive(Debug, Clone, PartialEq)]
pub struct NormedVector<V> {
    norm: NormKind,
    rows: Vec<AffineExpression<V>>,
}

impl<V: VariableKind> NormedVector<V> {
    pub fn new(norm: NormKind, rows: Vec<AffineExpression<V>>) -> Self {
        Self { norm, rows }
    }

    /// Norm of a vector of bare variables
    pub fn norm_of(variables: &[V], norm: NormKind) -> Self {
        Self {
            norm,
            rows: variables.iter().map(|v| AffineExpression::variable(*v)).collect(),
        }
    }

    pub fn norm(&self) -> NormKind {
        self.norm
    }

    pub fn rows(&self) -> &[AffineExpression<V>] {
        &self.rows
    }

    pub fn scale_rows(mut self, factor: f64) -> Self {
        self.rows = self.rows.into_iter().map(|r| r.scale(factor)).collect();
        self
    }

    pub fn translate<W, F>(&self, mut map: F) -> Result<NormedVector<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<W, ModelError>,
    {
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            rows.push(row.translate(&mut map)?);
        }
        Ok(NormedVector::new(self.norm, rows))
    }

    pub fn substitute<W, F>(&self, mut map: F) -> Result<NormedVector<W>, ModelError>
    where
        W: VariableKind,
        F: FnMut(&V) -> Result<AffineExpression<W>, ModelError>,
    {
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            rows.push(row.substitute(&mut map)?);
        }
        Ok(NormedVector::new(self.norm, rows))
    }

    /// Evaluate the rows and apply the norm
    pub fn value<A: Assignment<V> + ?Sized>(&self, assignment: &A) -> Result<f64, ModelError> {
        let mut values = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            values.push(row.value(assignment)?);
        }
        Ok(self.norm.apply(&values))
    }

    /// A norm is never negative
    pub fn lb(&self, _context: &V::Context) -> Result<f64, ModelError> {
        Ok(0.)
    }

    /// Norm of the largest magnitude every row can reach
    pub fn ub(&self, context: &V::Context) -> Result<f64, ModelError> {
        let mut magnitudes = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            magnitudes.push(row.lb(context)?.abs().max(row.ub(context)?.abs()));
        }
        Ok(self.norm.apply(&magnitudes))
    }

    /// Whether this is exactly the norm of the given variables, in the given order
    pub fn is_variable_vector_norm(&self, variables: &[V]) -> bool {
        if self.rows.len() != variables.len() {
            return false;
        }
        self.rows.iter().zip(variables).all(|(row, var)| {
            let row = row.simplify();
            row.constant() == 0.
                && row.linear().len() == 1
                && row.linear().terms()[0].scale == 1.
                && row.linear().terms()[0].variable == *var
        })
    }

    pub fn to_string_with(&self, context: &V::Context) -> Result<String, ModelError> {
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            rows.push(row.to_string_with(context)?);
        }
        Ok(format!("||({})||_{}", rows.join(", "), self.norm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::linear::tests::TestVar;

    #[test]
    fn value_of_norms() {
        let vars = [TestVar(0), TestVar(1)];
        let values = [3., -4.];
        let two = NormedVector::norm_of(&vars, NormKind::Two);
        assert!((two.value(&values[..]).unwrap() - 5.).abs() < 1e-12);
        let one = NormedVector::norm_of(&vars, NormKind::One);
        assert!((one.value(&values[..]).unwrap() - 7.).abs() < 1e-12);
    }

    #[test]
    fn upper_bound_uses_row_magnitudes() {
        let vars = [TestVar(0), TestVar(1)];
        let bounds = [(-3., 1.), (0., 4.)];
        let two = NormedVector::norm_of(&vars, NormKind::Two);
        assert!((two.ub(&bounds[..]).unwrap() - 5.).abs() < 1e-12);
        assert!((two.lb(&bounds[..]).unwrap()).abs() < 1e-12);
        let inf = NormedVector::norm_of(&vars, NormKind::Infinity);
        assert!((inf.ub(&bounds[..]).unwrap() - 4.).abs() < 1e-12);
    }

    #[test]
    fn recognizes_variable_norms() {
        let vars = [TestVar(0), TestVar(1)];
        let norm = NormedVector::norm_of(&vars, NormKind::Two);
        assert!(norm.is_variable_vector_norm(&vars));
        assert!(!norm.is_variable_vector_norm(&[TestVar(1), TestVar(0)]));
        assert!(!norm.is_variable_vector_norm(&vars[..1]));
        let scaled = norm.clone().scale_rows(2.);
        assert!(!scaled.is_variable_vector_norm(&vars));
    }
}
