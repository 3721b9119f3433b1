//! Robust optimization models
//!
//! A [`RoModel`] owns decision variables, one [`UncertaintySet`], constraints mixing decisions
//! and uncertainties, and an objective. Decisions and uncertainties tagged with a period are
//! wired automatically: a decision may react to every uncertainty revealed in its own or an
//! earlier period.
use std::rc::Rc;

use crate::expression::{ConicExpression, RoExpression};
use crate::optimize::constraint::{Constraint, RawConstraint};
use crate::optimize::objective::Objective;
use crate::robust_model::decision::{AffineSolution, DecisionRef, DecisionVariable};
use crate::robust_model::expectation::ExpectationProvider;
use crate::robust_model::realization::SolutionRealization;
use crate::robust_model::uncertainty::{UncertaintyRef, UncertaintyVariable};
use crate::robust_model::uncertainty_set::{
    format_period, ConstraintSetRef, SpecialSetType, UncertaintySet,
};
use crate::robust_model::ModelError;
use crate::utils::store::Store;

/// Constraint of a robust model
pub type RoConstraint = Constraint<RoExpression>;
/// Objective of a robust model
pub type RoObjective = Objective<RoExpression>;

/// An optimization problem with uncertain parameters
#[derive(Debug, Clone)]
pub struct RoModel {
    name: String,
    decision_variables: Store<DecisionVariable>,
    uncertainty_set: UncertaintySet,
    constraints: Vec<RoConstraint>,
    objective: Option<RoObjective>,
    expectation_provider: Option<Rc<dyn ExpectationProvider>>,
}

impl RoModel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uncertainty_set: UncertaintySet::new(name.clone()),
            name,
            decision_variables: Store::new(),
            constraints: Vec::new(),
            objective: None,
            expectation_provider: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // region Decision Variables
    /// Add a decision variable
    ///
    /// A decision with a period depends on every existing uncertainty whose period is not
    /// later than its own.
    pub fn add_decision_variable(
        &mut self,
        name: impl Into<String>,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<DecisionRef, ModelError> {
        let mut variable = DecisionVariable::new(name, period, lower_bound, upper_bound)?;
        if let Some(period) = period {
            for (uncertainty, uvar) in self.uncertainty_set.iter() {
                if uvar.period().is_some_and(|p| p <= period) {
                    variable.add_dependency(uncertainty);
                }
            }
        }
        Ok(self.decision_variables.add(variable))
    }

    /// Add a decision variable without a period depending on exactly the given uncertainties
    pub fn add_decision_variable_with_dependencies(
        &mut self,
        name: impl Into<String>,
        dependencies: &[UncertaintyRef],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<DecisionRef, ModelError> {
        let mut variable = DecisionVariable::new(name, None, lower_bound, upper_bound)?;
        for uncertainty in dependencies {
            self.uncertainty_set.variable(*uncertainty)?;
            variable.add_dependency(*uncertainty);
        }
        Ok(self.decision_variables.add(variable))
    }

    /// Add `n` decision variables named `{name}{i}` sharing period and bounds
    pub fn add_decision_variables(
        &mut self,
        n: usize,
        name: &str,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Vec<DecisionRef>, ModelError> {
        (0..n)
            .map(|i| {
                self.add_decision_variable(format!("{}{}", name, i), period, lower_bound, upper_bound)
            })
            .collect()
    }

    /// Add `n` decision variables named `{name}{i}`, variable `i` in period `first_period + i`
    pub fn add_decision_variables_for_each_period(
        &mut self,
        n: usize,
        name: &str,
        first_period: usize,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Vec<DecisionRef>, ModelError> {
        (0..n)
            .map(|i| {
                self.add_decision_variable(
                    format!("{}{}", name, i),
                    Some(first_period + i),
                    lower_bound,
                    upper_bound,
                )
            })
            .collect()
    }

    pub fn decision_variable(&self, index: DecisionRef) -> Result<&DecisionVariable, ModelError> {
        Ok(self.decision_variables.get(index)?)
    }

    pub fn decision_variables(&self) -> &[DecisionVariable] {
        self.decision_variables.items()
    }

    pub fn decision_indices(&self) -> Vec<DecisionRef> {
        self.decision_variables.indices()
    }

    pub fn decision_iter(&self) -> impl Iterator<Item = (DecisionRef, &DecisionVariable)> {
        self.decision_variables.iter()
    }

    pub fn num_decision_variables(&self) -> usize {
        self.decision_variables.len()
    }

    /// Record the realized policy of a decision
    pub fn set_affine_solution(
        &mut self,
        decision: DecisionRef,
        solution: AffineSolution,
    ) -> Result<(), ModelError> {
        self.decision_variables
            .get_mut(decision)?
            .set_affine_solution(solution);
        Ok(())
    }
    // endregion Decision Variables

    // region Uncertainty
    /// Add an uncertainty variable
    ///
    /// An uncertainty with a period becomes a dependency of every existing decision whose
    /// period is not earlier than its own.
    pub fn add_uncertainty_variable(
        &mut self,
        name: impl Into<String>,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<UncertaintyRef, ModelError> {
        let uncertainty = self
            .uncertainty_set
            .add_variable(name, period, lower_bound, upper_bound)?;
        if let Some(period) = period {
            for decision in self.decision_variables.items_mut() {
                if decision.period().is_some_and(|p| period <= p) {
                    decision.add_dependency(uncertainty);
                }
            }
        }
        Ok(uncertainty)
    }

    /// Add `n` uncertainty variables named `{name}{i}` sharing period and bounds
    pub fn add_uncertainty_variables(
        &mut self,
        n: usize,
        name: &str,
        period: Option<usize>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Vec<UncertaintyRef>, ModelError> {
        (0..n)
            .map(|i| {
                self.add_uncertainty_variable(
                    format!("{}{}", name, i),
                    period,
                    lower_bound,
                    upper_bound,
                )
            })
            .collect()
    }

    /// Add `n` uncertainty variables named `{name}{i}`, variable `i` in period `first_period + i`
    pub fn add_uncertainty_variables_for_each_period(
        &mut self,
        n: usize,
        name: &str,
        first_period: usize,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Vec<UncertaintyRef>, ModelError> {
        (0..n)
            .map(|i| {
                self.add_uncertainty_variable(
                    format!("{}{}", name, i),
                    Some(first_period + i),
                    lower_bound,
                    upper_bound,
                )
            })
            .collect()
    }

    pub fn uncertainty_set(&self) -> &UncertaintySet {
        &self.uncertainty_set
    }

    pub fn uncertainty_variables(&self) -> &[UncertaintyVariable] {
        self.uncertainty_set.variables()
    }

    pub fn uncertainty_indices(&self) -> Vec<UncertaintyRef> {
        self.uncertainty_set.indices()
    }

    pub fn num_uncertainty_variables(&self) -> usize {
        self.uncertainty_set.num_variables()
    }

    /// Add a constraint to the last constraint set of the uncertainty set
    pub fn add_uncertainty_constraint(
        &mut self,
        name: impl Into<String>,
        constraint: impl Into<RawConstraint<ConicExpression<UncertaintyRef>>>,
    ) -> Result<(), ModelError> {
        self.uncertainty_set.add_constraint(name, constraint)
    }

    pub fn add_uncertainty_constraint_to(
        &mut self,
        set: ConstraintSetRef,
        name: impl Into<String>,
        constraint: impl Into<RawConstraint<ConicExpression<UncertaintyRef>>>,
    ) -> Result<(), ModelError> {
        self.uncertainty_set.add_constraint_to(set, name, constraint)
    }

    /// Start a new alternative region of the uncertainty set
    pub fn add_uncertainty_constraint_set(&mut self) -> ConstraintSetRef {
        self.uncertainty_set.add_constraint_set()
    }

    /// Add the defining constraint of a ball or budget uncertainty set
    pub fn add_special_uncertainty_constraint(
        &mut self,
        set_type: SpecialSetType,
        budget: f64,
    ) -> Result<(), ModelError> {
        self.uncertainty_set
            .add_special_type_constraint(set_type, budget)
    }

    pub fn clear_uncertainty_constraints(&mut self) {
        self.uncertainty_set.clear_constraints();
    }
    // endregion Uncertainty

    // region Constraints and Objective
    /// Add a named constraint, returns its position
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        constraint: impl Into<RawConstraint<RoExpression>>,
    ) -> usize {
        self.constraints.push(Constraint::new(name, constraint.into()));
        self.constraints.len() - 1
    }

    pub fn constraints(&self) -> &[RoConstraint] {
        &self.constraints
    }

    pub fn set_objective(&mut self, objective: RoObjective) {
        self.objective = Some(objective);
    }

    pub fn objective(&self) -> Result<&RoObjective, ModelError> {
        self.objective.as_ref().ok_or(ModelError::MissingObjective)
    }

    pub fn has_objective(&self) -> bool {
        self.objective.is_some()
    }
    // endregion Constraints and Objective

    // region Evaluation
    pub fn objective_value_for_solution(
        &self,
        solution: &SolutionRealization,
    ) -> Result<f64, ModelError> {
        self.objective()?.expression().value(solution)
    }

    /// Whether every constraint holds up to the tolerance
    pub fn solution_feasible(
        &self,
        solution: &SolutionRealization,
        tolerance: f64,
    ) -> Result<bool, ModelError> {
        for constraint in &self.constraints {
            if !constraint.feasible(solution, tolerance)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
    // endregion Evaluation

    // region Expectation Provider
    pub fn set_expectation_provider(&mut self, provider: impl ExpectationProvider + 'static) {
        self.expectation_provider = Some(Rc::new(provider));
    }

    /// Share a provider with other models
    pub fn set_shared_expectation_provider(&mut self, provider: Rc<dyn ExpectationProvider>) {
        self.expectation_provider = Some(provider);
    }

    pub fn has_expectation_provider(&self) -> bool {
        self.expectation_provider.is_some()
    }

    pub fn expectation_provider(&self) -> Result<&dyn ExpectationProvider, ModelError> {
        self.expectation_provider
            .as_deref()
            .ok_or(ModelError::MissingExpectationProvider)
    }

    pub fn shared_expectation_provider(&self) -> Option<Rc<dyn ExpectationProvider>> {
        self.expectation_provider.clone()
    }
    // endregion Expectation Provider

    /// Objective, constraints, decision bounds and the uncertainty set, one item per line
    pub fn full_string(&self) -> Result<String, ModelError> {
        let mut s = self.name.clone();
        let objective = self.objective()?;
        s.push_str(&format!(
            "\n{} {}",
            objective.sense(),
            objective.expression().to_string_with(self)?
        ));
        for constraint in &self.constraints {
            s.push_str(&format!(
                "\n{}: {} {} 0",
                constraint.name(),
                constraint.expression().to_string_with(self)?,
                constraint.sense()
            ));
        }
        for variable in self.decision_variables.items() {
            s.push_str(&format!(
                "\n{} <= {} p({}) <= {}",
                variable.lower_bound(),
                variable.name(),
                format_period(variable.period()),
                variable.upper_bound()
            ));
        }
        s.push('\n');
        s.push_str(&self.uncertainty_set.full_string()?);
        Ok(s)
    }
}
