//! Module providing representation of conic model variables
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::expression::VariableKind;
use crate::optimize::conic_model::ConicModel;
use crate::robust_model::ModelError;
use crate::utils::store::Index;

/// Handle of a variable of a [`ConicModel`]
pub type ConicRef = Index<ConicVariable>;

/// A variable of a deterministic conic model
#[derive(Debug, Clone, PartialEq)]
pub struct ConicVariable {
    name: String,
    lower_bound: f64,
    upper_bound: f64,
    variable_type: VariableType,
    /// Which primal entity this variable is the dual of, set when the model is a dual model
    dual_information: Option<DualInformation>,
    /// Value at the last solution
    value: Option<f64>,
}

impl ConicVariable {
    pub fn new(
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        variable_type: VariableType,
    ) -> Result<Self, ModelError> {
        if lower_bound > upper_bound {
            return Err(ModelError::InvalidVariableBounds);
        }
        Ok(Self {
            name: name.into(),
            lower_bound,
            upper_bound,
            variable_type,
            dual_information: None,
            value: None,
        })
    }

    /// Attach the primal entity this variable is the dual of
    pub fn with_dual_information(mut self, info: DualInformation) -> Self {
        self.dual_information = Some(info);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn variable_type(&self) -> VariableType {
        self.variable_type
    }

    pub fn dual_information(&self) -> Option<DualInformation> {
        self.dual_information
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Value at the last solution
    pub fn value(&self) -> Result<f64, ModelError> {
        self.value
            .ok_or_else(|| ModelError::MissingSolution(self.name.clone()))
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = Some(value);
    }

    pub fn invalidate_value(&mut self) {
        self.value = None;
    }
}

impl Display for ConicVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} in [{}, {}]",
            self.name, self.variable_type, self.lower_bound, self.upper_bound
        )
    }
}

impl VariableKind for ConicRef {
    type Context = ConicModel;

    fn bounds(&self, context: &ConicModel) -> Result<(f64, f64), ModelError> {
        let variable = context.variable(*self)?;
        Ok((variable.lower_bound, variable.upper_bound))
    }

    fn label(&self, context: &ConicModel) -> Result<String, ModelError> {
        Ok(context.variable(*self)?.name.clone())
    }
}

/// Represents the type of variable in an optimization problem
///
/// # Notes:
/// Not all variable types are supported for all solvers, currently Clarabel only supports
/// Continuous variables
#[derive(Debug, PartialEq, Clone, Copy, Hash, Eq, Serialize, Deserialize)]
pub enum VariableType {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
    /// Binary Variable
    Binary,
}

impl Display for VariableType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "CONTINUOUS"),
            VariableType::Integer => write!(f, "INTEGER"),
            VariableType::Binary => write!(f, "BINARY"),
        }
    }
}

/// Primal entity a dual variable belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DualInformation {
    /// Dual of the constraint at this position
    Constraint(usize),
    /// Dual of one row of the normed vector of the constraint at this position
    ConstraintNormedVector(usize, usize),
    /// Dual of the lower bound of a primal variable
    VariableLb(ConicRef),
    /// Dual of the upper bound of a primal variable
    VariableUb(ConicRef),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bounds() {
        if let Err(ModelError::InvalidVariableBounds) =
            ConicVariable::new("x", 1., 0., VariableType::Continuous)
        {
            // Intentionally blank
        } else {
            panic!("Variable with lower bound above upper bound accepted")
        }
    }

    #[test]
    fn value_lifecycle() {
        let mut variable = ConicVariable::new("x", 0., 1., VariableType::Continuous).unwrap();
        assert!(!variable.has_value());
        assert!(variable.value().is_err());
        variable.set_value(0.5);
        assert!((variable.value().unwrap() - 0.5).abs() < 1e-25);
        variable.invalidate_value();
        assert!(!variable.has_value());
        assert_eq!(format!("{}", variable), "x:CONTINUOUS in [0, 1]");
    }
}
