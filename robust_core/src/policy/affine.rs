//! Affinely adjustable robust counterparts
//!
//! Every decision `x` with dependencies `u_1..u_k` is replaced by the policy
//! `b_x + sum_k a_xk * u_k`, where `b_x` and `a_xk` are free conic variables. Uncertain
//! constraints and the objective are then replaced by their robust counterparts, obtained by
//! dualizing the inner minimization over each alternative constraint set of the uncertainty
//! set, or by their expectation for stochastic expressions.
use std::borrow::Cow;

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};

use crate::expression::{
    AffineExpression, Assignment, NormedVector, RoExpression, UncertaintyMode, NO_LOWER_BOUND,
    NO_UPPER_BOUND,
};
use crate::optimize::conic_model::{norm_leq, ConicModel};
use crate::optimize::constraint::{ConstraintSense, RawConstraint};
use crate::optimize::objective::{Objective, ObjectiveSense};
use crate::optimize::solvers::{
    ClarabelBackend, ConicBackend, ConicSolver, SolverError, SolverSettings,
};
use crate::optimize::variable::ConicRef;
use crate::optimize::OptimizationStatus;
use crate::policy::PolicyError;
use crate::robust_model::{
    AffineSolution, ConstraintSetRef, DecisionRef, ModelError, RoModel, SolutionRealization,
    UncertaintyRealization, UncertaintyRef,
};
use crate::utils::diagnostics::Diagnostics;
use crate::utils::store::StoreError;

/// Compiles a [`RoModel`] into a [`ConicModel`] under affine decision rules
///
/// # Examples
/// ```rust
/// use robust_core::expression::RoExpression;
/// use robust_core::optimize::objective::Objective;
/// use robust_core::policy::AffinePolicyCompiler;
/// use robust_core::robust_model::RoModel;
///
/// let mut model = RoModel::new("cover");
/// let u = model.add_uncertainty_variable("u", None, -1., 1.).unwrap();
/// let x = model.add_decision_variable("x", None, f64::NEG_INFINITY, f64::INFINITY).unwrap();
/// model.add_constraint("c", RoExpression::decision(x).geq(&RoExpression::uncertainty(u)));
/// model.set_objective(Objective::minimize(RoExpression::decision(x)));
///
/// let mut compiler = AffinePolicyCompiler::new(&model);
/// compiler.solve().unwrap();
/// assert!((compiler.objective_value() - 1.).abs() < 1e-5);
/// ```
#[derive(Debug)]
pub struct AffinePolicyCompiler<'m, B: ConicBackend = ClarabelBackend> {
    model: Cow<'m, RoModel>,
    conic_model: ConicModel,
    solver: ConicSolver<B>,
    adjustable_factors: Vec<Vec<ConicRef>>,
    adjustable_constants: Vec<ConicRef>,
    built: bool,
    diagnostics: Diagnostics,
}

impl<'m> AffinePolicyCompiler<'m, ClarabelBackend> {
    /// Compiler using the default clarabel backend
    pub fn new(model: &'m RoModel) -> Self {
        Self::with_backend(model, ClarabelBackend::default())
    }
}

impl<'m, B: ConicBackend> AffinePolicyCompiler<'m, B> {
    // region Creation Functions
    pub fn with_backend(model: &'m RoModel, backend: B) -> Self {
        Self::from_cow(Cow::Borrowed(model), backend)
    }

    pub(crate) fn from_cow(model: Cow<'m, RoModel>, backend: B) -> Self {
        let conic_model = ConicModel::new(format!("AARC of {}", model.name()));
        Self {
            model,
            conic_model,
            solver: ConicSolver::new(backend),
            adjustable_factors: Vec::new(),
            adjustable_constants: Vec::new(),
            built: false,
            diagnostics: Diagnostics::new(),
        }
    }
    // endregion Creation Functions

    // region Accessors
    /// The compiled model
    pub fn model(&self) -> &RoModel {
        &self.model
    }

    pub fn conic_model(&self) -> &ConicModel {
        &self.conic_model
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Conic variables `a_xk` of a decision, in dependency order
    pub fn adjustable_factors(&self, decision: DecisionRef) -> Result<&[ConicRef], PolicyError> {
        if !self.built {
            return Err(PolicyError::NotBuilt);
        }
        self.model.decision_variable(decision)?;
        Ok(decision.lookup(&self.adjustable_factors)?.as_slice())
    }

    /// Conic variable `b_x` of a decision
    pub fn adjustable_constant(&self, decision: DecisionRef) -> Result<ConicRef, PolicyError> {
        if !self.built {
            return Err(PolicyError::NotBuilt);
        }
        self.model.decision_variable(decision)?;
        Ok(*decision.lookup(&self.adjustable_constants)?)
    }
    // endregion Accessors

    // region Build
    /// Compile the robust model, may only be called once
    pub fn build(&mut self) -> Result<(), PolicyError> {
        if self.built {
            return Err(SolverError::AlreadyBuilt.into());
        }
        let model: &RoModel = &self.model;
        for variable in model.decision_variables() {
            let mut factors = Vec::with_capacity(variable.dependencies().len());
            for dependency in variable.dependencies() {
                let name = format!(
                    "AV_{}{}",
                    variable.name(),
                    model.uncertainty_set().variable(*dependency)?.name()
                );
                factors.push(
                    self.conic_model
                        .add_variable(name, NO_LOWER_BOUND, NO_UPPER_BOUND)?,
                );
            }
            self.adjustable_factors.push(factors);
        }
        for variable in model.decision_variables() {
            let constant = self.conic_model.add_variable(
                format!("B_{}", variable.name()),
                NO_LOWER_BOUND,
                NO_UPPER_BOUND,
            )?;
            self.adjustable_constants.push(constant);
        }

        let mut builder = CounterpartBuilder {
            model,
            conic: &mut self.conic_model,
            factors: &self.adjustable_factors,
            constants: &self.adjustable_constants,
        };
        builder.add_objective()?;
        for constraint in model.constraints() {
            builder.add_constraint(constraint.name(), constraint.sense(), constraint.expression())?;
        }
        for (index, variable) in model.decision_iter() {
            if variable.lower_bound() != NO_LOWER_BOUND {
                let bound = RoExpression::decision(index).geq_value(variable.lower_bound());
                builder.add_raw_constraint(&format!("LB_{}", variable.name()), &bound)?;
            }
            if variable.upper_bound() != NO_UPPER_BOUND {
                let bound = RoExpression::decision(index).leq_value(variable.upper_bound());
                builder.add_raw_constraint(&format!("UB_{}", variable.name()), &bound)?;
            }
        }

        self.built = true;
        tracing::info!(
            model = self.model.name(),
            variables = self.conic_model.num_variables(),
            constraints = self.conic_model.constraints().len(),
            "compiled affine policy"
        );
        Ok(())
    }
    // endregion Build

    // region Solve
    /// Build if needed, then solve the conic model
    ///
    /// # Returns
    /// The solver status, limits being hit are reported through the status
    pub fn solve(&mut self) -> Result<OptimizationStatus, PolicyError> {
        if !self.built {
            self.build()?;
        }
        let status = self.solver.solve(&mut self.conic_model)?;
        if status != OptimizationStatus::Optimal {
            self.diagnostics.warn(format!(
                "{} finished with status {}",
                self.conic_model.name(),
                status
            ));
        }
        Ok(status)
    }

    pub fn set_runtime_limit(&mut self, limit: impl Into<Option<f64>>) {
        self.solver.set_runtime_limit(limit);
    }

    pub fn set_memory_limit(&mut self, limit: impl Into<Option<f64>>) {
        self.solver.set_memory_limit(limit);
    }

    pub fn set_solver_settings(&mut self, settings: SolverSettings) {
        self.solver.set_settings(settings);
    }

    pub fn status(&self) -> OptimizationStatus {
        self.solver.status()
    }

    pub fn has_solution(&self) -> bool {
        self.solver.has_solution()
    }

    /// Runtime of the last solve in seconds, NaN before any solve
    pub fn runtime(&self) -> f64 {
        self.solver.runtime()
    }

    /// Objective value of the last solve, NaN without a solution
    pub fn objective_value(&self) -> f64 {
        self.solver.objective_value()
    }
    // endregion Solve

    // region Solutions
    /// Solved policy of a decision
    pub fn affine_solution(&self, decision: DecisionRef) -> Result<AffineSolution, PolicyError> {
        let variable = self.model.decision_variable(decision)?;
        let constant = self
            .solver
            .value(&self.conic_model, self.adjustable_constant(decision)?)?;
        let mut scales = IndexMap::new();
        for (dependency, factor) in variable
            .dependencies()
            .iter()
            .zip(self.adjustable_factors(decision)?)
        {
            scales.insert(*dependency, self.solver.value(&self.conic_model, *factor)?);
        }
        Ok(AffineSolution::new(constant, scales))
    }

    /// Copy of the compiled model with every decision's solved policy attached
    pub fn model_with_solutions(&self) -> Result<RoModel, PolicyError> {
        let mut model = RoModel::clone(&self.model);
        for decision in self.model.decision_indices() {
            model.set_affine_solution(decision, self.affine_solution(decision)?)?;
        }
        Ok(model)
    }

    /// Evaluate every decision's policy at a realization
    pub fn specific_solution(
        &self,
        realization: &UncertaintyRealization,
    ) -> Result<SolutionRealization<'_>, PolicyError> {
        let expected = self.model.num_uncertainty_variables();
        if realization.len() != expected {
            return Err(ModelError::RealizationDimension {
                expected,
                found: realization.len(),
            }
            .into());
        }
        let mut solutions = Vec::with_capacity(self.model.num_decision_variables());
        for decision in self.model.decision_indices() {
            solutions.push(self.affine_solution(decision)?.value(realization)?);
        }
        Ok(SolutionRealization::new(
            &self.model,
            realization.values().to_vec(),
            solutions,
        )?)
    }
    // endregion Solutions

    // region Reoptimization
    /// Secondary objective: the original objective at the all-ones realization
    pub fn add_average_reoptimization(&mut self) -> Result<(), PolicyError> {
        let ones = UncertaintyRealization::new(vec![1.; self.model.num_uncertainty_variables()]);
        self.add_reoptimization_objective_for_realization(&ones)
    }

    /// Append the original objective, with the policies evaluated at `realization`, as an
    /// additional objective of the built conic model
    pub fn add_reoptimization_objective_for_realization(
        &mut self,
        realization: &UncertaintyRealization,
    ) -> Result<(), PolicyError> {
        if !self.built {
            return Err(PolicyError::NotBuilt);
        }
        let objective = self.model.objective()?;
        let sense = objective.sense();
        let expression = objective
            .expression()
            .substitute_to_conic(|d| self.policy_at(*d, realization), realization)?;
        self.conic_model
            .add_objective(Objective::new(sense, expression));
        Ok(())
    }

    /// `b_x + sum_k a_xk * u_k` with the uncertainties fixed
    fn policy_at(
        &self,
        decision: DecisionRef,
        realization: &UncertaintyRealization,
    ) -> Result<AffineExpression<ConicRef>, ModelError> {
        let variable = self.model.decision_variable(decision)?;
        let factors = decision.lookup(&self.adjustable_factors)?;
        let mut policy = AffineExpression::variable(*decision.lookup(&self.adjustable_constants)?);
        for (dependency, factor) in variable.dependencies().iter().zip(factors) {
            policy = policy.add_term(realization.value_of(dependency)?, *factor);
        }
        Ok(policy)
    }
    // endregion Reoptimization
}

/// Dual objective and per uncertainty dual residuals of one inner minimization
#[derive(Debug, Clone, Default)]
struct DualAccumulator {
    objective: AffineExpression<ConicRef>,
    residuals: Vec<AffineExpression<ConicRef>>,
}

impl DualAccumulator {
    fn new(uncertainties: usize) -> Self {
        Self {
            objective: AffineExpression::new(),
            residuals: vec![AffineExpression::new(); uncertainties],
        }
    }

    fn add_objective_term(&mut self, scale: f64, variable: ConicRef) {
        if scale != 0. {
            self.objective = std::mem::take(&mut self.objective).add_term(scale, variable);
        }
    }

    fn add_objective_constant(&mut self, constant: f64) {
        self.objective = std::mem::take(&mut self.objective).add_constant(constant);
    }

    fn residual(
        &mut self,
        uncertainty: UncertaintyRef,
    ) -> Result<&mut AffineExpression<ConicRef>, StoreError> {
        let len = self.residuals.len();
        self.residuals
            .get_mut(uncertainty.slot())
            .ok_or(StoreError::OutOfRange {
                slot: uncertainty.slot(),
                len,
            })
    }

    fn add_residual_term(
        &mut self,
        uncertainty: UncertaintyRef,
        scale: f64,
        variable: ConicRef,
    ) -> Result<(), StoreError> {
        let residual = self.residual(uncertainty)?;
        *residual = std::mem::take(residual).add_term(scale, variable);
        Ok(())
    }

    fn add_residual_constant(
        &mut self,
        uncertainty: UncertaintyRef,
        constant: f64,
    ) -> Result<(), StoreError> {
        let residual = self.residual(uncertainty)?;
        *residual = std::mem::take(residual).add_constant(constant);
        Ok(())
    }
}

/// Writes counterparts of robust expressions into the conic model
struct CounterpartBuilder<'a> {
    model: &'a RoModel,
    conic: &'a mut ConicModel,
    factors: &'a [Vec<ConicRef>],
    constants: &'a [ConicRef],
}

impl CounterpartBuilder<'_> {
    fn factor(&self, decision: DecisionRef, position: usize) -> Result<ConicRef, StoreError> {
        let factors = decision.lookup(self.factors)?;
        factors
            .get(position)
            .copied()
            .ok_or(StoreError::OutOfRange {
                slot: position,
                len: factors.len(),
            })
    }

    fn constant(&self, decision: DecisionRef) -> Result<ConicRef, StoreError> {
        Ok(*decision.lookup(self.constants)?)
    }

    /// Uncertainty scaled decisions must multiply non adjustable decisions
    fn non_adjustable(&self, decision: DecisionRef) -> Result<ConicRef, PolicyError> {
        let variable = self.model.decision_variable(decision)?;
        if !variable.dependencies().is_empty() {
            return Err(PolicyError::ScaledDecisionOnAdjustable(
                variable.name().to_string(),
            ));
        }
        Ok(self.constant(decision)?)
    }

    // region Constraints
    fn add_raw_constraint(
        &mut self,
        name: &str,
        constraint: &RawConstraint<RoExpression>,
    ) -> Result<(), PolicyError> {
        self.add_constraint(name, constraint.sense, &constraint.expression)
    }

    fn add_constraint(
        &mut self,
        name: &str,
        sense: ConstraintSense,
        expression: &RoExpression,
    ) -> Result<(), PolicyError> {
        match sense {
            ConstraintSense::Geq => {
                let counterpart = self.counterpart(expression, name)?;
                self.conic
                    .add_constraint(format!("{}RC", name), counterpart.geq_value(0.));
            }
            ConstraintSense::Leq => {
                let counterpart = self.counterpart(&expression.negate(), name)?;
                self.conic
                    .add_constraint(format!("{}RC", name), counterpart.geq_value(0.));
            }
            ConstraintSense::Eq => self.add_equality(expression, name)?,
        }
        tracing::debug!(constraint = name, sense = %sense, "compiled robust constraint");
        Ok(())
    }

    fn add_objective(&mut self) -> Result<(), PolicyError> {
        let model = self.model;
        let objective = model.objective()?;
        match objective.sense() {
            ObjectiveSense::Maximize => {
                let counterpart = self.counterpart(objective.expression(), "Objective")?;
                self.conic.add_objective(Objective::maximize(counterpart));
            }
            ObjectiveSense::Minimize => {
                let counterpart =
                    self.counterpart(&objective.expression().negate(), "Objective")?;
                self.conic
                    .add_objective(Objective::minimize(counterpart.negate()));
            }
        }
        Ok(())
    }
    // endregion Constraints

    // region Counterparts
    /// Deterministic expression that is a lower bound of `expression` over the uncertainty
    fn counterpart(
        &mut self,
        expression: &RoExpression,
        name: &str,
    ) -> Result<AffineExpression<ConicRef>, PolicyError> {
        match expression.mode() {
            UncertaintyMode::Union | UncertaintyMode::Average => {
                self.robust_counterpart(expression, name)
            }
            UncertaintyMode::Stochastic => self.stochastic_counterpart(expression),
        }
    }

    fn robust_counterpart(
        &mut self,
        expression: &RoExpression,
        name: &str,
    ) -> Result<AffineExpression<ConicRef>, PolicyError> {
        let model = self.model;
        let epigraph = self.conic.add_variable(
            format!("EpiVar{}", name),
            NO_LOWER_BOUND,
            NO_UPPER_BOUND,
        )?;
        let epigraph_expression = AffineExpression::variable(epigraph);
        let sets = model.uncertainty_set().constraint_sets();
        let mut total = AffineExpression::new();
        for set in &sets {
            let mut dual = DualAccumulator::new(model.num_uncertainty_variables());
            self.add_dual_of_constraint_set(&mut dual, *set, name)?;
            self.add_dual_of_expression(&mut dual, expression)?;
            let DualAccumulator {
                objective,
                residuals,
            } = dual;
            for ((_, variable), residual) in model.uncertainty_set().iter().zip(residuals) {
                self.conic.add_constraint(
                    format!("{}_DualConstr_{}_US{}", name, variable.name(), set.slot()),
                    residual.equals_value(0.),
                );
            }
            if expression.mode() == UncertaintyMode::Union {
                self.conic.add_constraint(
                    format!("EpiConstr{}_US{}", name, set.slot()),
                    epigraph_expression.leq(&objective),
                );
            } else {
                total = total.add(&objective);
            }
        }
        if expression.mode() == UncertaintyMode::Average {
            let mean = total.scale(1. / sets.len().max(1) as f64);
            self.conic.add_constraint(
                format!("EpiConstr{}_AVG", name),
                epigraph_expression.leq(&mean),
            );
        }
        Ok(epigraph_expression)
    }

    fn add_dual_of_constraint_set(
        &mut self,
        dual: &mut DualAccumulator,
        set: ConstraintSetRef,
        name: &str,
    ) -> Result<(), PolicyError> {
        let model = self.model;
        let uncertainty_set = model.uncertainty_set();
        let slot = set.slot();
        for constraint in uncertainty_set.constraints(set)? {
            let dual_variable = self.conic.add_variable(
                format!("{}_{}_DVar_US{}", name, constraint.name(), slot),
                constraint.dual_lb(),
                constraint.dual_ub(),
            )?;
            let affine = constraint.expression().affine();
            dual.add_objective_term(affine.constant(), dual_variable);
            for term in affine.linear().terms() {
                dual.add_residual_term(term.variable, term.scale, dual_variable)?;
            }
            if let Some(normed) = constraint.expression().normed() {
                self.add_dual_of_normed_vector(
                    dual,
                    normed,
                    dual_variable,
                    &format!("{}{}_US{}", name, constraint.name(), slot),
                )?;
            }
        }
        for (uncertainty, variable) in uncertainty_set.iter() {
            if variable.lower_bound() != NO_LOWER_BOUND {
                let bound_dual = self.conic.add_variable(
                    format!("{}_LBD_{}_US{}", name, variable.name(), slot),
                    NO_LOWER_BOUND,
                    0.,
                )?;
                dual.add_objective_term(-variable.lower_bound(), bound_dual);
                dual.add_residual_term(uncertainty, 1., bound_dual)?;
            }
            if variable.upper_bound() != NO_UPPER_BOUND {
                let bound_dual = self.conic.add_variable(
                    format!("{}_UBD_{}_US{}", name, variable.name(), slot),
                    0.,
                    NO_UPPER_BOUND,
                )?;
                dual.add_objective_term(-variable.upper_bound(), bound_dual);
                dual.add_residual_term(uncertainty, 1., bound_dual)?;
            }
        }
        Ok(())
    }

    /// One dual per row, bounded in the dual norm by the constraint's dual
    fn add_dual_of_normed_vector(
        &mut self,
        dual: &mut DualAccumulator,
        normed: &NormedVector<UncertaintyRef>,
        dual_variable: ConicRef,
        name: &str,
    ) -> Result<(), PolicyError> {
        let row_duals = self.conic.add_variables(
            normed.rows().len(),
            &format!("{}_DSVar", name),
            NO_LOWER_BOUND,
            NO_UPPER_BOUND,
        )?;
        for (row, row_dual) in normed.rows().iter().zip(&row_duals) {
            dual.add_objective_term(row.constant(), *row_dual);
            for term in row.linear().terms() {
                dual.add_residual_term(term.variable, term.scale, *row_dual)?;
            }
        }
        self.conic.add_constraint(
            format!("{}_Dual_SOC", name),
            norm_leq(
                &row_duals,
                normed.norm().dual(),
                &AffineExpression::variable(dual_variable),
            ),
        );
        Ok(())
    }

    /// Contribution of the expression itself, with every decision replaced by its policy
    fn add_dual_of_expression(
        &self,
        dual: &mut DualAccumulator,
        expression: &RoExpression,
    ) -> Result<(), PolicyError> {
        for term in expression.uncertainties().terms() {
            self.model.uncertainty_set().variable(term.variable)?;
            dual.add_residual_constant(term.variable, term.scale)?;
        }
        for term in expression.decisions().terms() {
            let variable = self.model.decision_variable(term.variable)?;
            for (position, dependency) in variable.dependencies().iter().enumerate() {
                dual.add_residual_term(
                    *dependency,
                    term.scale,
                    self.factor(term.variable, position)?,
                )?;
            }
            dual.add_objective_term(term.scale, self.constant(term.variable)?);
        }
        for term in expression.uncertainty_decisions().terms() {
            let constant = self.non_adjustable(term.variable.decision)?;
            self.model
                .uncertainty_set()
                .variable(term.variable.uncertainty)?;
            dual.add_residual_term(term.variable.uncertainty, term.scale, constant)?;
        }
        dual.add_objective_constant(expression.constant());
        Ok(())
    }

    /// Expected value of the expression under the model's expectation provider
    fn stochastic_counterpart(
        &mut self,
        expression: &RoExpression,
    ) -> Result<AffineExpression<ConicRef>, PolicyError> {
        let model = self.model;
        let provider = model.expectation_provider()?;
        let decisions = model.num_decision_variables();
        let width = model
            .decision_variables()
            .iter()
            .map(|v| v.dependencies().len())
            .max()
            .unwrap_or(0);

        // Row is the decision, column the position in its dependencies
        let factor_scales = provider.expected_matrix(&|realization| {
            let mut scales = DMatrix::zeros(decisions, width);
            for term in expression.decisions().terms() {
                let variable = model.decision_variable(term.variable)?;
                for (position, dependency) in variable.dependencies().iter().enumerate() {
                    scales[(term.variable.slot(), position)] +=
                        term.scale * realization.value_of(dependency)?;
                }
            }
            for term in expression.uncertainty_decisions().terms() {
                let decision = term.variable.decision;
                let factor = term.scale * realization.value_of(&term.variable.uncertainty)?;
                let variable = model.decision_variable(decision)?;
                for (position, dependency) in variable.dependencies().iter().enumerate() {
                    scales[(decision.slot(), position)] +=
                        factor * realization.value_of(dependency)?;
                }
            }
            Ok(scales)
        })?;
        let constant_scales = provider.expected_vector(&|realization| {
            let mut scales = DVector::zeros(decisions);
            for term in expression.decisions().terms() {
                model.decision_variable(term.variable)?;
                scales[term.variable.slot()] += term.scale;
            }
            for term in expression.uncertainty_decisions().terms() {
                let decision = term.variable.decision;
                model.decision_variable(decision)?;
                scales[decision.slot()] +=
                    term.scale * realization.value_of(&term.variable.uncertainty)?;
            }
            Ok(scales)
        })?;
        let uncertain_constant = provider
            .expected_value(&|realization| expression.uncertainties().value(realization))?;

        let mut result =
            AffineExpression::constant_value(expression.constant() + uncertain_constant);
        for (decision, variable) in model.decision_iter() {
            for position in 0..variable.dependencies().len() {
                let scale = factor_scales[(decision.slot(), position)];
                if scale != 0. {
                    result = result.add_term(scale, self.factor(decision, position)?);
                }
            }
            let scale = constant_scales[decision.slot()];
            if scale != 0. {
                result = result.add_term(scale, self.constant(decision)?);
            }
        }
        Ok(result)
    }

    /// Coefficient wise equality, the policy must cancel every uncertainty exactly
    fn add_equality(&mut self, expression: &RoExpression, name: &str) -> Result<(), PolicyError> {
        if expression.mode() == UncertaintyMode::Stochastic {
            return Err(PolicyError::EqualityUnderStochastic(name.to_string()));
        }
        let expression = expression.simplify();
        if expression.is_zero() {
            tracing::debug!(constraint = name, "skipped trivial equality");
            return Ok(());
        }
        let model = self.model;
        let mut coefficients = DualAccumulator::new(model.num_uncertainty_variables());
        self.add_dual_of_expression(&mut coefficients, &expression)?;
        let DualAccumulator {
            objective,
            residuals,
        } = coefficients;
        for ((_, variable), residual) in model.uncertainty_set().iter().zip(residuals) {
            self.conic.add_constraint(
                format!("{}_AffRC_{}", name, variable.name()),
                residual.equals_value(0.),
            );
        }
        self.conic
            .add_constraint(format!("{}_AffRC_Base", name), objective.equals_value(0.));
        Ok(())
    }
    // endregion Counterparts
}
