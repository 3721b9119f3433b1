//! JSON interchange for uncertainty realizations and affine policies
//!
//! Realizations are a JSON array of arrays of numbers, one inner array per realization in the
//! order of the uncertainty variables. Policies are exported by name, so they stay readable
//! without the model they were solved for.
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expression::VariableKind;
use crate::robust_model::{
    EmpiricalExpectationProvider, ModelError, RoModel, UncertaintyRealization,
};

// region JSON Policy
/// Serialized form of one decision's affine policy
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonPolicy {
    pub constant: f64,
    /// Scale per uncertainty name, in dependency order
    pub scales: IndexMap<String, f64>,
}

/// Policies of every decision carrying a solution, keyed by decision name
///
/// Decisions without an attached solution are skipped.
pub fn policies_by_name(model: &RoModel) -> Result<IndexMap<String, JsonPolicy>, JsonError> {
    let mut policies = IndexMap::new();
    for variable in model.decision_variables() {
        let Ok(solution) = variable.affine_solution() else {
            continue;
        };
        let mut scales = IndexMap::new();
        for (uncertainty, scale) in &solution.scales {
            scales.insert(uncertainty.label(model.uncertainty_set())?, *scale);
        }
        policies.insert(
            variable.name().to_string(),
            JsonPolicy {
                constant: solution.constant,
                scales,
            },
        );
    }
    Ok(policies)
}

/// JSON object of the solved policies of a model
///
/// # Examples
/// ```rust
/// use indexmap::IndexMap;
/// use robust_core::io::policy_to_json;
/// use robust_core::robust_model::{AffineSolution, RoModel};
///
/// let mut model = RoModel::new("policy");
/// let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
/// let x = model.add_decision_variable_with_dependencies("x", &[u], 0., 10.).unwrap();
/// model
///     .set_affine_solution(x, AffineSolution::new(1., IndexMap::from([(u, 0.5)])))
///     .unwrap();
/// assert_eq!(
///     policy_to_json(&model).unwrap(),
///     r#"{"x":{"constant":1.0,"scales":{"u":0.5}}}"#
/// );
/// ```
pub fn policy_to_json(model: &RoModel) -> Result<String, JsonError> {
    Ok(serde_json::to_string(&policies_by_name(model)?)?)
}
// endregion JSON Policy

// region JSON Realizations
pub fn realizations_from_json(json: &str) -> Result<Vec<UncertaintyRealization>, JsonError> {
    let values: Vec<Vec<f64>> = match serde_json::from_str(json) {
        Ok(values) => values,
        Err(err) => return Err(JsonError::UnableToParse(format!("{:?}", err))),
    };
    Ok(values.into_iter().map(UncertaintyRealization::new).collect())
}

pub fn realizations_to_json(realizations: &[UncertaintyRealization]) -> Result<String, JsonError> {
    let values: Vec<&[f64]> = realizations.iter().map(|r| r.values()).collect();
    Ok(serde_json::to_string(&values)?)
}

pub fn read_realizations<P: AsRef<Path>>(path: P) -> Result<Vec<UncertaintyRealization>, JsonError> {
    let json = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => return Err(JsonError::UnableToRead(format!("{:?}", err))),
    };
    realizations_from_json(&json)
}

pub fn write_realizations<P: AsRef<Path>>(
    path: P,
    realizations: &[UncertaintyRealization],
) -> Result<(), JsonError> {
    fs::write(path, realizations_to_json(realizations)?)?;
    Ok(())
}

/// Empirical distribution over the realizations stored in a JSON file
pub fn read_expectation_provider<P: AsRef<Path>>(
    path: P,
) -> Result<EmpiricalExpectationProvider, JsonError> {
    Ok(EmpiricalExpectationProvider::new(read_realizations(path)?)?)
}
// endregion JSON Realizations

#[derive(Error, Debug)]
pub enum JsonError {
    #[error("Unable to read file due to {0}")]
    UnableToRead(String),
    #[error("Unable to parse json due to {0}")]
    UnableToParse(String),
    #[error("Unable to resolve a model entity")]
    Model(#[from] ModelError),
    #[error("Serde json error")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Unable to write to file")]
    UnableToWrite(#[from] std::io::Error),
}
