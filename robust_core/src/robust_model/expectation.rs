//! Expected values of functions of the uncertainty
use std::fmt::Debug;

use nalgebra::{DMatrix, DVector};

use crate::robust_model::realization::UncertaintyRealization;
use crate::robust_model::ModelError;

/// Distribution of the uncertainty used by stochastic expressions
///
/// The evaluated functions may fail, the first failure is returned.
pub trait ExpectationProvider: Debug {
    /// Expected value of a scalar function of the uncertainty
    fn expected_value(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<f64, ModelError>,
    ) -> Result<f64, ModelError>;

    /// Expected value of a vector valued function of the uncertainty
    fn expected_vector(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<DVector<f64>, ModelError>,
    ) -> Result<DVector<f64>, ModelError>;

    /// Expected value of a matrix valued function of the uncertainty
    fn expected_matrix(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<DMatrix<f64>, ModelError>,
    ) -> Result<DMatrix<f64>, ModelError>;
}

/// Uniform distribution over a fixed collection of realizations
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalExpectationProvider {
    realizations: Vec<UncertaintyRealization>,
}

impl EmpiricalExpectationProvider {
    /// # Returns
    /// The provider, or an error if there are no realizations
    pub fn new(realizations: Vec<UncertaintyRealization>) -> Result<Self, ModelError> {
        if realizations.is_empty() {
            return Err(ModelError::EmptyRealizations);
        }
        Ok(Self { realizations })
    }

    /// Build from raw value vectors, one per realization
    pub fn from_values(values: Vec<Vec<f64>>) -> Result<Self, ModelError> {
        Self::new(values.into_iter().map(UncertaintyRealization::new).collect())
    }

    pub fn realizations(&self) -> &[UncertaintyRealization] {
        &self.realizations
    }

    fn count(&self) -> f64 {
        self.realizations.len() as f64
    }
}

impl ExpectationProvider for EmpiricalExpectationProvider {
    fn expected_value(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<f64, ModelError>,
    ) -> Result<f64, ModelError> {
        let total = self
            .realizations
            .iter()
            .map(f)
            .sum::<Result<f64, ModelError>>()?;
        Ok(total / self.count())
    }

    fn expected_vector(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<DVector<f64>, ModelError>,
    ) -> Result<DVector<f64>, ModelError> {
        let mut total: Option<DVector<f64>> = None;
        for realization in &self.realizations {
            let value = f(realization)?;
            total = Some(match total {
                None => value,
                Some(sum) if sum.len() == value.len() => sum + value,
                Some(_) => return Err(ModelError::InconsistentExpectationShape),
            });
        }
        total
            .map(|sum| sum / self.count())
            .ok_or(ModelError::EmptyRealizations)
    }

    fn expected_matrix(
        &self,
        f: &dyn Fn(&UncertaintyRealization) -> Result<DMatrix<f64>, ModelError>,
    ) -> Result<DMatrix<f64>, ModelError> {
        let mut total: Option<DMatrix<f64>> = None;
        for realization in &self.realizations {
            let value = f(realization)?;
            total = Some(match total {
                None => value,
                Some(sum) if sum.shape() == value.shape() => sum + value,
                Some(_) => return Err(ModelError::InconsistentExpectationShape),
            });
        }
        total
            .map(|sum| sum / self.count())
            .ok_or(ModelError::EmptyRealizations)
    }
}
