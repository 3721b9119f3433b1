//! Decision variables of robust models
use indexmap::IndexMap;

use crate::expression::{Assignment, VariableKind};
use crate::robust_model::model::RoModel;
use crate::robust_model::uncertainty::UncertaintyRef;
use crate::robust_model::ModelError;
use crate::utils::store::Index;

/// Handle of a decision variable of a [`RoModel`]
pub type DecisionRef = Index<DecisionVariable>;

/// A controllable unknown, optionally reacting to the uncertainties it depends on
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionVariable {
    name: String,
    period: Option<usize>,
    lower_bound: f64,
    upper_bound: f64,
    /// Uncertainties the decision may react to, in the order they were declared
    dependencies: Vec<UncertaintyRef>,
    /// Policy found by the last compilation
    affine_solution: Option<AffineSolution>,
}

impl DecisionVariable {
    pub(crate) fn new(
        name: impl Into<String>,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Self, ModelError> {
        if lower_bound > upper_bound {
            return Err(ModelError::InvalidVariableBounds);
        }
        Ok(Self {
            name: name.into(),
            period,
            lower_bound,
            upper_bound,
            dependencies: Vec::new(),
            affine_solution: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Option<usize> {
        self.period
    }

    pub fn has_period(&self) -> bool {
        self.period.is_some()
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn dependencies(&self) -> &[UncertaintyRef] {
        &self.dependencies
    }

    /// Whether the decision may react to the uncertainty
    pub fn depends_on(&self, uncertainty: UncertaintyRef) -> bool {
        self.dependencies.contains(&uncertainty)
    }

    /// Position of the uncertainty among the dependencies
    pub fn dependency_position(&self, uncertainty: UncertaintyRef) -> Option<usize> {
        self.dependencies.iter().position(|u| *u == uncertainty)
    }

    pub(crate) fn add_dependency(&mut self, uncertainty: UncertaintyRef) {
        self.dependencies.push(uncertainty);
    }

    pub fn affine_solution(&self) -> Result<&AffineSolution, ModelError> {
        self.affine_solution
            .as_ref()
            .ok_or_else(|| ModelError::MissingSolution(self.name.clone()))
    }

    pub fn set_affine_solution(&mut self, solution: AffineSolution) {
        self.affine_solution = Some(solution);
    }
}

impl VariableKind for DecisionRef {
    type Context = RoModel;

    fn bounds(&self, context: &RoModel) -> Result<(f64, f64), ModelError> {
        let variable = context.decision_variable(*self)?;
        Ok((variable.lower_bound, variable.upper_bound))
    }

    fn label(&self, context: &RoModel) -> Result<String, ModelError> {
        Ok(context.decision_variable(*self)?.name.clone())
    }
}

/// Realized affine policy `constant + sum_u scale_u * u`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AffineSolution {
    pub constant: f64,
    /// Scale per dependency, in dependency order
    pub scales: IndexMap<UncertaintyRef, f64>,
}

impl AffineSolution {
    pub fn new(constant: f64, scales: IndexMap<UncertaintyRef, f64>) -> Self {
        Self { constant, scales }
    }

    /// Value of the policy at a realization
    pub fn value<A: Assignment<UncertaintyRef> + ?Sized>(
        &self,
        realization: &A,
    ) -> Result<f64, ModelError> {
        let mut total = self.constant;
        for (uncertainty, scale) in &self.scales {
            total += scale * realization.value_of(uncertainty)?;
        }
        Ok(total)
    }

    pub fn to_string_with(&self, model: &RoModel) -> Result<String, ModelError> {
        let mut s = self.constant.to_string();
        for (uncertainty, scale) in &self.scales {
            s.push_str(&format!(" + {}*{}", scale, uncertainty.label(model.uncertainty_set())?));
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies() {
        let mut model = RoModel::new("m");
        let u = model.add_uncertainty_variable("u", Some(0), -1., 1.).unwrap();
        let v = model.add_uncertainty_variable("v", Some(2), -1., 1.).unwrap();
        let x = model.add_decision_variable("x", Some(1), 0., 1.).unwrap();
        let var = model.decision_variable(x).unwrap();
        assert!(var.depends_on(u));
        assert!(!var.depends_on(v));
        assert_eq!(var.dependency_position(u), Some(0));
        assert_eq!(x.bounds(&model).unwrap(), (0., 1.));
        assert_eq!(x.label(&model).unwrap(), "x");
    }

    #[test]
    fn affine_solution_value() {
        let mut model = RoModel::new("m");
        let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
        let v = model.add_uncertainty_variable("v", None, -1., 1.).unwrap();
        let mut scales = IndexMap::new();
        scales.insert(u, 2.);
        scales.insert(v, -1.);
        let solution = AffineSolution::new(1., scales);
        let realization = vec![0.5, 1.];
        assert!((solution.value(&realization).unwrap() - 1.).abs() < 1e-12);
        assert_eq!(solution.to_string_with(&model).unwrap(), "1 + 2*u + -1*v");
    }

    #[test]
    fn missing_affine_solution() {
        let mut var = DecisionVariable::new("x", None, 0., 1.).unwrap();
        assert!(var.affine_solution().is_err());
        var.set_affine_solution(AffineSolution::new(0.5, IndexMap::new()));
        assert!((var.affine_solution().unwrap().constant - 0.5).abs() < 1e-25);
        assert!(DecisionVariable::new("y", None, 1., 0.).is_err());
    }
}
