//! Deterministic second order cone models handed to a solver backend
//!
//! A [`ConicModel`] owns its variables in a [`Store`], so [`ConicRef`] handles are only valid
//! for the model that issued them (and its clones).
use crate::expression::{AffineExpression, Assignment, ConicExpression, NormKind};
use crate::optimize::constraint::{Constraint, RawConstraint, SosConstraint};
use crate::optimize::objective::{Objective, ObjectiveSense};
use crate::optimize::variable::{ConicRef, ConicVariable, DualInformation, VariableType};
use crate::robust_model::ModelError;
use crate::utils::store::Store;

/// Constraint of a conic model, `||rows|| + affine sense 0`
pub type ConicConstraint = Constraint<ConicExpression<ConicRef>>;
/// Objective of a conic model
pub type ConicObjective = Objective<AffineExpression<ConicRef>>;

/// A second order cone program
#[derive(Debug, Clone)]
pub struct ConicModel {
    name: String,
    variables: Store<ConicVariable>,
    constraints: Vec<ConicConstraint>,
    sos_constraints: Vec<SosConstraint>,
    objectives: Vec<ConicObjective>,
    dual: Option<Box<ConicModel>>,
}

impl ConicModel {
    // region Creation Functions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Store::new(),
            constraints: Vec::new(),
            sos_constraints: Vec::new(),
            objectives: Vec::new(),
            dual: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    // endregion Creation Functions

    // region Variables
    /// Add a continuous variable
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<ConicRef, ModelError> {
        self.add_variable_of_type(name, lower_bound, upper_bound, VariableType::Continuous)
    }

    pub fn add_variable_of_type(
        &mut self,
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        variable_type: VariableType,
    ) -> Result<ConicRef, ModelError> {
        let variable = ConicVariable::new(name, lower_bound, upper_bound, variable_type)?;
        Ok(self.variables.add(variable))
    }

    /// Add a continuous variable that is the dual of some primal entity
    pub fn add_variable_with_dual_info(
        &mut self,
        name: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        info: DualInformation,
    ) -> Result<ConicRef, ModelError> {
        let variable = ConicVariable::new(name, lower_bound, upper_bound, VariableType::Continuous)?
            .with_dual_information(info);
        Ok(self.variables.add(variable))
    }

    /// Add `n` continuous variables named `{name}_{i}`
    pub fn add_variables(
        &mut self,
        n: usize,
        name: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Vec<ConicRef>, ModelError> {
        (0..n)
            .map(|i| self.add_variable(format!("{}_{}", name, i), lower_bound, upper_bound))
            .collect()
    }

    pub fn variable(&self, index: ConicRef) -> Result<&ConicVariable, ModelError> {
        Ok(self.variables.get(index)?)
    }

    pub fn variables(&self) -> &[ConicVariable] {
        self.variables.items()
    }

    pub fn variable_indices(&self) -> Vec<ConicRef> {
        self.variables.indices()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }
    // endregion Variables

    // region Constraints
    /// Add a named constraint, returns its position
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        constraint: impl Into<RawConstraint<ConicExpression<ConicRef>>>,
    ) -> usize {
        self.constraints.push(Constraint::new(name, constraint.into()));
        self.constraints.len() - 1
    }

    pub fn constraints(&self) -> &[ConicConstraint] {
        &self.constraints
    }

    pub fn constraint(&self, position: usize) -> Result<&ConicConstraint, ModelError> {
        self.constraints
            .get(position)
            .ok_or(ModelError::MissingConstraint(position))
    }

    /// At most one of the variables may be non-zero
    pub fn add_sos_constraint(&mut self, exclusive: Vec<ConicRef>) {
        self.sos_constraints.push(SosConstraint::new(exclusive));
    }

    pub fn sos_constraints(&self) -> &[SosConstraint] {
        &self.sos_constraints
    }
    // endregion Constraints

    // region Objectives
    /// Append an objective, later objectives are optimized after earlier ones
    pub fn add_objective(&mut self, objective: ConicObjective) {
        self.objectives.push(objective);
    }

    pub fn clear_and_set_objective(&mut self, objective: ConicObjective) {
        self.objectives.clear();
        self.add_objective(objective);
    }

    pub fn objectives(&self) -> &[ConicObjective] {
        &self.objectives
    }

    /// The primary objective
    pub fn objective(&self) -> Result<&ConicObjective, ModelError> {
        self.objectives.first().ok_or(ModelError::MissingObjective)
    }
    // endregion Objectives

    // region Model Properties
    pub fn is_multi_objective(&self) -> bool {
        self.objectives.len() > 1
    }

    /// Whether every variable is continuous
    pub fn is_continuous(&self) -> bool {
        self.variables
            .items()
            .iter()
            .all(|v| v.variable_type() == VariableType::Continuous)
    }

    /// Whether every constraint is affine and there are no SOS constraints
    pub fn all_affine(&self) -> bool {
        self.constraints.iter().all(|c| c.is_affine()) && self.sos_constraints.is_empty()
    }
    // endregion Model Properties

    // region Solution
    /// Store a solution, one value per variable, and evaluate every objective at it
    pub fn set_solution(&mut self, values: &[f64]) -> Result<(), ModelError> {
        if values.len() != self.variables.len() {
            return Err(ModelError::RealizationDimension {
                expected: self.variables.len(),
                found: values.len(),
            });
        }
        for (variable, value) in self.variables.items_mut().zip(values) {
            variable.set_value(*value);
        }
        for objective in self.objectives.iter_mut() {
            let value = objective.expression().value(values)?;
            objective.set_value(value);
        }
        Ok(())
    }

    /// Values of all variables at the last solution
    pub fn solution_values(&self) -> Result<Vec<f64>, ModelError> {
        self.variables.items().iter().map(|v| v.value()).collect()
    }

    pub fn has_solution(&self) -> bool {
        !self.variables.is_empty() && self.variables.items().iter().all(|v| v.has_value())
    }

    /// Store one dual value per constraint
    pub fn set_constraint_duals(&mut self, values: &[f64]) -> Result<(), ModelError> {
        if values.len() != self.constraints.len() {
            return Err(ModelError::RealizationDimension {
                expected: self.constraints.len(),
                found: values.len(),
            });
        }
        for (constraint, value) in self.constraints.iter_mut().zip(values) {
            constraint.set_dual_value(*value);
        }
        Ok(())
    }

    /// Drop variable values, objective values and constraint duals
    pub fn invalidate_solution(&mut self) {
        self.variables.items_mut().for_each(|v| v.invalidate_value());
        self.objectives.iter_mut().for_each(|o| o.invalidate_value());
        self.constraints
            .iter_mut()
            .for_each(|c| c.invalidate_dual_value());
    }
    // endregion Solution

    // region Dual
    /// Build the Lagrangian dual of this model
    ///
    /// One dual variable is added per constraint (bounded by the constraint's dual bounds), per
    /// finite variable bound and per row of every normed vector. For every primal variable the
    /// dual gets a constraint `DVar_{name}` requiring the net dual residual to vanish. The dual
    /// objective value equals the primal objective value at optimality.
    ///
    /// # Returns
    /// An error if the model has no objective or holds integer variables or SOS constraints
    pub fn compute_dual(&mut self) -> Result<(), ModelError> {
        self.invalidate_dual();
        if !self.is_continuous() || !self.sos_constraints.is_empty() {
            return Err(ModelError::DualUnsupported);
        }
        let objective = self.objective()?.clone();
        let mut dual = ConicModel::new(format!("{}Dual", self.name));
        let mut dual_objective: AffineExpression<ConicRef> = AffineExpression::new();
        let mut residuals: Vec<AffineExpression<ConicRef>> =
            vec![AffineExpression::new(); self.variables.len()];
        for (position, constraint) in self.constraints.iter().enumerate() {
            self.add_dual_of_constraint(
                &mut dual,
                &mut dual_objective,
                &mut residuals,
                position,
                constraint,
            )?;
        }
        for (index, variable) in self.variables.iter() {
            let mut residual = index.lookup(&residuals)?.clone();
            if variable.lower_bound() != f64::NEG_INFINITY {
                let dv = dual.add_variable_with_dual_info(
                    format!("DLB_{}", variable.name()),
                    f64::NEG_INFINITY,
                    0.,
                    DualInformation::VariableLb(index),
                )?;
                dual_objective = dual_objective.add_term(-variable.lower_bound(), dv);
                residual = residual.add_term(1., dv);
            }
            if variable.upper_bound() != f64::INFINITY {
                let dv = dual.add_variable_with_dual_info(
                    format!("DUB_{}", variable.name()),
                    0.,
                    f64::INFINITY,
                    DualInformation::VariableUb(index),
                )?;
                dual_objective = dual_objective.add_term(-variable.upper_bound(), dv);
                residual = residual.add_term(1., dv);
            }
            residuals[index.slot()] = residual;
        }
        let sign = objective.sense().sign();
        dual_objective = dual_objective.add_constant(sign * objective.expression().constant());
        for term in objective.expression().linear().terms() {
            self.variables.get(term.variable)?;
            let residual = &mut residuals[term.variable.slot()];
            *residual = residual.clone().add_constant(sign * term.scale);
        }
        for (index, variable) in self.variables.iter() {
            let residual = index.lookup(&residuals)?;
            dual.add_constraint(format!("DVar_{}", variable.name()), residual.equals_value(0.));
        }
        match objective.sense() {
            ObjectiveSense::Minimize => dual.add_objective(Objective::maximize(dual_objective)),
            ObjectiveSense::Maximize => {
                dual.add_objective(Objective::minimize(dual_objective.negate()))
            }
        }
        self.dual = Some(Box::new(dual));
        Ok(())
    }

    fn add_dual_of_constraint(
        &self,
        dual: &mut ConicModel,
        dual_objective: &mut AffineExpression<ConicRef>,
        residuals: &mut [AffineExpression<ConicRef>],
        position: usize,
        constraint: &ConicConstraint,
    ) -> Result<(), ModelError> {
        let dv = dual.add_variable_with_dual_info(
            format!("DE_{}", constraint.name()),
            constraint.dual_lb(),
            constraint.dual_ub(),
            DualInformation::Constraint(position),
        )?;
        let affine = constraint.expression().affine();
        *dual_objective = dual_objective.clone().add_term(affine.constant(), dv);
        self.add_to_residuals(residuals, affine, dv)?;
        if let Some(normed) = constraint.expression().normed() {
            let mut dus = Vec::with_capacity(normed.rows().len());
            for (row_number, row) in normed.rows().iter().enumerate() {
                let du = dual.add_variable_with_dual_info(
                    format!("DNV_{}_{}", constraint.name(), row_number),
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    DualInformation::ConstraintNormedVector(position, row_number),
                )?;
                *dual_objective = dual_objective.clone().add_term(row.constant(), du);
                self.add_to_residuals(residuals, row, du)?;
                dus.push(du);
            }
            dual.add_constraint(
                format!("DSOC_{}", constraint.name()),
                ConicExpression::norm_of(&dus, normed.norm().dual())
                    .leq(&AffineExpression::variable(dv)),
            );
        }
        Ok(())
    }

    fn add_to_residuals(
        &self,
        residuals: &mut [AffineExpression<ConicRef>],
        expression: &AffineExpression<ConicRef>,
        dual_variable: ConicRef,
    ) -> Result<(), ModelError> {
        for term in expression.linear().terms() {
            self.variables.get(term.variable)?;
            let residual = &mut residuals[term.variable.slot()];
            *residual = residual.clone().add_term(term.scale, dual_variable);
        }
        Ok(())
    }

    /// The model built by the last [`ConicModel::compute_dual`]
    pub fn dual(&self) -> Result<&ConicModel, ModelError> {
        self.dual.as_deref().ok_or(ModelError::MissingDual)
    }

    pub fn dual_mut(&mut self) -> Result<&mut ConicModel, ModelError> {
        self.dual.as_deref_mut().ok_or(ModelError::MissingDual)
    }

    pub fn invalidate_dual(&mut self) {
        self.dual = None;
    }
    // endregion Dual

    /// Every objective, constraint and variable bound, one per line
    pub fn full_string(&self) -> Result<String, ModelError> {
        let mut s = self.name.clone();
        for (number, objective) in self.objectives.iter().enumerate() {
            s.push_str(&format!(
                "\nObjective {}: {} {}",
                number + 1,
                objective.sense(),
                objective.expression().to_string_with(self)?
            ));
        }
        for constraint in &self.constraints {
            s.push('\n');
            s.push_str(&constraint.to_string_with(self)?);
            if let Ok(value) = constraint.dual_value() {
                s.push_str(&format!(" ({})", value));
            }
        }
        for sos in &self.sos_constraints {
            let mut names = Vec::with_capacity(sos.variables().len());
            for variable in sos.variables() {
                names.push(self.variable(*variable)?.name().to_string());
            }
            s.push_str(&format!("\nSOS({})", names.join(", ")));
        }
        for variable in self.variables.items() {
            s.push_str(&format!(
                "\n{} <= {} <= {}",
                variable.lower_bound(),
                variable.name(),
                variable.upper_bound()
            ));
            if let Ok(value) = variable.value() {
                s.push_str(&format!(" ({})", value));
            }
        }
        Ok(s)
    }
}

impl Assignment<ConicRef> for ConicModel {
    fn value_of(&self, variable: &ConicRef) -> Result<f64, ModelError> {
        self.variable(*variable)?.value()
    }
}

/// `||variables|| <= bound`
pub(crate) fn norm_leq(
    variables: &[ConicRef],
    norm: NormKind,
    bound: &AffineExpression<ConicRef>,
) -> RawConstraint<ConicExpression<ConicRef>> {
    ConicExpression::norm_of(variables, norm).leq(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::constraint::ConstraintSense;

    /// min x + 2y s.t. x + y >= 1, x in [0, 10], y >= 0
    fn small_lp() -> (ConicModel, ConicRef, ConicRef) {
        let mut model = ConicModel::new("lp");
        let x = model.add_variable("x", 0., 10.).unwrap();
        let y = model.add_variable("y", 0., f64::INFINITY).unwrap();
        model.add_constraint(
            "cover",
            AffineExpression::variable(x).add_term(1., y).geq_value(1.),
        );
        model.add_objective(Objective::minimize(
            AffineExpression::variable(x).add_term(2., y),
        ));
        (model, x, y)
    }

    #[test]
    fn model_properties() {
        let (mut model, x, y) = small_lp();
        assert!(model.is_continuous());
        assert!(model.all_affine());
        assert!(!model.is_multi_objective());
        model.add_objective(Objective::maximize(AffineExpression::variable(x)));
        assert!(model.is_multi_objective());
        model.add_constraint(
            "ball",
            norm_leq(&[x, y], NormKind::Two, &AffineExpression::constant_value(3.)),
        );
        assert!(!model.all_affine());
        model.add_variable_of_type("z", 0., 1., VariableType::Binary).unwrap();
        assert!(!model.is_continuous());
    }

    #[test]
    fn solution_lifecycle() {
        let (mut model, x, _) = small_lp();
        assert!(model.set_solution(&[1.]).is_err());
        model.set_solution(&[1., 0.]).unwrap();
        assert!(model.has_solution());
        assert!((model.value_of(&x).unwrap() - 1.).abs() < 1e-12);
        assert!((model.objective().unwrap().value().unwrap() - 1.).abs() < 1e-12);
        model.set_constraint_duals(&[-1.]).unwrap();
        assert!(model.full_string().unwrap().contains("(-1)"));
        model.invalidate_solution();
        assert!(!model.has_solution());
        assert!(model.objective().unwrap().value().is_err());
        assert!(!model.constraints()[0].has_dual_value());
    }

    #[test]
    fn dual_structure() {
        let (mut model, _, _) = small_lp();
        assert!(model.dual().is_err());
        model.compute_dual().unwrap();
        let dual = model.dual().unwrap();
        // DE_cover, DLB_x, DUB_x, DLB_y
        assert_eq!(dual.num_variables(), 4);
        assert_eq!(dual.constraints().len(), 2);
        assert_eq!(dual.constraints()[0].name(), "DVar_x");
        assert_eq!(dual.constraints()[0].sense(), ConstraintSense::Eq);
        assert_eq!(dual.objective().unwrap().sense(), ObjectiveSense::Maximize);
        let de = &dual.variables()[0];
        assert_eq!(de.name(), "DE_cover");
        assert_eq!(de.upper_bound(), 0.);
        assert_eq!(de.dual_information(), Some(DualInformation::Constraint(0)));
    }

    #[test]
    fn dual_objective_at_dual_optimum() {
        let (mut model, _, _) = small_lp();
        model.compute_dual().unwrap();
        let dual = model.dual_mut().unwrap();
        // Primal optimum x = 1, y = 0 with value 1. Dual optimum: DE = -1, DLB_y = -1
        dual.set_solution(&[-1., 0., 0., -1.]).unwrap();
        for constraint in dual.constraints() {
            assert!(constraint.feasible(&*dual, 1e-12).unwrap());
        }
        assert!((dual.objective().unwrap().value().unwrap() - 1.).abs() < 1e-12);
    }

    #[test]
    fn dual_of_norm_constraint() {
        let mut model = ConicModel::new("soc");
        let x = model.add_variable("x", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        let y = model.add_variable("y", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        model.add_constraint(
            "budget",
            norm_leq(&[x, y], NormKind::One, &AffineExpression::constant_value(1.)),
        );
        model.add_objective(Objective::maximize(AffineExpression::variable(x)));
        model.compute_dual().unwrap();
        let dual = model.dual().unwrap();
        // DE_budget plus one row dual per normed row, no bound duals
        assert_eq!(dual.num_variables(), 3);
        let soc = &dual.constraints()[0];
        assert_eq!(soc.name(), "DSOC_budget");
        let normed = soc.expression().normed().unwrap();
        assert_eq!(normed.norm(), NormKind::Infinity);
        assert_eq!(dual.objective().unwrap().sense(), ObjectiveSense::Minimize);
    }

    #[test]
    fn dual_requires_objective() {
        let mut model = ConicModel::new("empty");
        model.add_variable("x", 0., 1.).unwrap();
        if let Err(ModelError::MissingObjective) = model.compute_dual() {
            // Intentionally blank
        } else {
            panic!("Dual computed without objective")
        }
    }
}
