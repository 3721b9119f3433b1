//! Concrete values for uncertainties and decisions
use crate::expression::Assignment;
use crate::robust_model::decision::DecisionRef;
use crate::robust_model::model::RoModel;
use crate::robust_model::uncertainty::{UncertaintyRef, UncertaintyScaledDecision};
use crate::robust_model::ModelError;

/// One value per uncertainty variable, in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UncertaintyRealization {
    values: Vec<f64>,
}

impl UncertaintyRealization {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for UncertaintyRealization {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl Assignment<UncertaintyRef> for UncertaintyRealization {
    fn value_of(&self, variable: &UncertaintyRef) -> Result<f64, ModelError> {
        Ok(*variable.lookup(&self.values)?)
    }
}

/// A scenario together with the decisions taken in it
///
/// The values are checked against the model dimensions on construction and read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct SolutionRealization<'m> {
    model: &'m RoModel,
    realization: Vec<f64>,
    solutions: Vec<f64>,
}

impl<'m> SolutionRealization<'m> {
    pub fn new(
        model: &'m RoModel,
        realization: Vec<f64>,
        solutions: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let uncertainties = model.uncertainty_set().num_variables();
        if realization.len() != uncertainties {
            return Err(ModelError::RealizationDimension {
                expected: uncertainties,
                found: realization.len(),
            });
        }
        let decisions = model.num_decision_variables();
        if solutions.len() != decisions {
            return Err(ModelError::RealizationDimension {
                expected: decisions,
                found: solutions.len(),
            });
        }
        Ok(Self {
            model,
            realization,
            solutions,
        })
    }

    pub fn model(&self) -> &RoModel {
        self.model
    }

    pub fn realization(&self) -> &[f64] {
        &self.realization
    }

    pub fn solutions(&self) -> &[f64] {
        &self.solutions
    }

    /// `name: value` per uncertainty variable
    pub fn realization_string(&self) -> String {
        self.model
            .uncertainty_set()
            .variables()
            .iter()
            .zip(&self.realization)
            .map(|(var, value)| format!("{}: {}\n", var.name(), value))
            .collect()
    }

    /// `name: value` per decision variable
    pub fn solution_string(&self) -> String {
        self.model
            .decision_variables()
            .iter()
            .zip(&self.solutions)
            .map(|(var, value)| format!("{}: {}\n", var.name(), value))
            .collect()
    }

    /// Whether every model constraint holds up to the tolerance
    pub fn feasible(&self, tolerance: f64) -> Result<bool, ModelError> {
        self.model.solution_feasible(self, tolerance)
    }

    pub fn objective_value(&self) -> Result<f64, ModelError> {
        self.model.objective_value_for_solution(self)
    }
}

impl Assignment<UncertaintyRef> for SolutionRealization<'_> {
    fn value_of(&self, variable: &UncertaintyRef) -> Result<f64, ModelError> {
        self.model.uncertainty_set().variable(*variable)?;
        Ok(*variable.lookup(&self.realization)?)
    }
}

impl Assignment<DecisionRef> for SolutionRealization<'_> {
    fn value_of(&self, variable: &DecisionRef) -> Result<f64, ModelError> {
        self.model.decision_variable(*variable)?;
        Ok(*variable.lookup(&self.solutions)?)
    }
}

impl Assignment<UncertaintyScaledDecision> for SolutionRealization<'_> {
    fn value_of(&self, variable: &UncertaintyScaledDecision) -> Result<f64, ModelError> {
        Ok(self.value_of(&variable.uncertainty)? * self.value_of(&variable.decision)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::RoExpression;
    use crate::optimize::objective::Objective;

    fn model() -> (RoModel, UncertaintyRef, DecisionRef) {
        let mut model = RoModel::new("m");
        let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
        let x = model.add_decision_variable("x", None, 0., 2.).unwrap();
        model.add_constraint(
            "cover",
            RoExpression::decision(x).geq(&RoExpression::uncertainty(u)),
        );
        model.set_objective(Objective::minimize(RoExpression::decision(x)));
        (model, u, x)
    }

    #[test]
    fn values_and_strings() {
        let (model, u, x) = model();
        let solution = SolutionRealization::new(&model, vec![0.5], vec![1.]).unwrap();
        assert!((solution.value_of(&u).unwrap() - 0.5).abs() < 1e-25);
        assert!((solution.value_of(&x).unwrap() - 1.).abs() < 1e-25);
        let product = UncertaintyScaledDecision::new(u, x);
        assert!((solution.value_of(&product).unwrap() - 0.5).abs() < 1e-25);
        assert_eq!(solution.realization_string(), "u: 0.5\n");
        assert_eq!(solution.solution_string(), "x: 1\n");
    }

    #[test]
    fn feasibility_and_objective() {
        let (model, _, _) = model();
        let good = SolutionRealization::new(&model, vec![0.5], vec![1.]).unwrap();
        assert!(good.feasible(1e-3).unwrap());
        assert!((good.objective_value().unwrap() - 1.).abs() < 1e-25);
        let bad = SolutionRealization::new(&model, vec![1.], vec![0.5]).unwrap();
        assert!(!bad.feasible(1e-3).unwrap());
    }

    #[test]
    fn dimensions_are_checked() {
        let (model, _, _) = model();
        if let Err(ModelError::RealizationDimension {
            expected: 1,
            found: 2,
        }) = SolutionRealization::new(&model, vec![0., 1.], vec![1.])
        {
            // Intentionally blank
        } else {
            panic!("Realization with too many values accepted")
        }
        assert!(SolutionRealization::new(&model, vec![0.], vec![]).is_err());
    }

    #[test]
    fn uncertainty_realization_by_slot() {
        let (model, u, _) = model();
        let realization = UncertaintyRealization::from(vec![0.25]);
        assert!((realization.value_of(&u).unwrap() - 0.25).abs() < 1e-25);
        assert_eq!(realization.len(), 1);
        assert!(model.uncertainty_set().in_uncertainty_set(&realization).unwrap());
    }
}
