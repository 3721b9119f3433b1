//! Implements a solver interface for Clarabel
//!
//! Clarabel solves `min 1/2 x'Px + q'x` subject to `Ax + s = b` with `s` in a product of cones.
//! Affine rows go to the zero or nonnegative cone, two-norms become second order cones, and
//! one and infinity norms are written as linear rows (one-norms with auxiliary columns).
use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::expression::{AffineExpression, NormKind};
use crate::optimize::conic_model::{ConicConstraint, ConicModel};
use crate::optimize::constraint::ConstraintSense;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::{ConicBackend, SolverError, SolverSettings};
use crate::optimize::variable::ConicRef;
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Sparse row of the constraint matrix, `(column, value)` pairs
type Row = Vec<(usize, f64)>;

/// Cone kinds of the linear rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinearCone {
    Zero,
    Nonnegative,
}

/// Linear objective over the columns
#[derive(Debug, Clone)]
struct LinearObjective {
    sense: ObjectiveSense,
    coefficients: Row,
    constant: f64,
}

impl LinearObjective {
    fn value(&self, x: &[f64]) -> f64 {
        self.constant
            + self
                .coefficients
                .iter()
                .map(|(col, coef)| coef * x[*col])
                .sum::<f64>()
    }
}

/// Constraint rows in clarabel's `Ax + s = b` form
#[derive(Debug, Clone, Default)]
struct ConeRows {
    a_rows: Vec<usize>,
    a_cols: Vec<usize>,
    a_vals: Vec<f64>,
    b: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl ConeRows {
    fn num_rows(&self) -> usize {
        self.b.len()
    }

    fn push_entries(&mut self, row: usize, entries: &[(usize, f64)]) {
        for (col, val) in entries {
            self.a_rows.push(row);
            self.a_cols.push(*col);
            self.a_vals.push(*val);
        }
    }

    /// Add one row of a zero or nonnegative cone, merging with the previous cone of the same kind
    fn push_linear(&mut self, entries: &[(usize, f64)], b: f64, cone: LinearCone) -> usize {
        let row = self.num_rows();
        self.push_entries(row, entries);
        self.b.push(b);
        match (self.cones.last_mut(), cone) {
            (Some(SupportedConeT::ZeroConeT(n)), LinearCone::Zero) => *n += 1,
            (Some(SupportedConeT::NonnegativeConeT(n)), LinearCone::Nonnegative) => *n += 1,
            (_, LinearCone::Zero) => self.cones.push(SupportedConeT::ZeroConeT(1)),
            (_, LinearCone::Nonnegative) => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
        row
    }

    /// Add a second order cone, the first row is the bounding one
    fn push_soc(&mut self, rows: Vec<(Row, f64)>) {
        let dimension = rows.len();
        for (entries, b) in rows {
            let row = self.num_rows();
            self.push_entries(row, &entries);
            self.b.push(b);
        }
        self.cones.push(SupportedConeT::SecondOrderConeT(dimension));
    }
}

/// Model translated into matrices
#[derive(Debug, Clone)]
struct AssembledProblem {
    /// Number of columns belonging to model variables, auxiliary columns follow
    num_variables: usize,
    num_columns: usize,
    rows: ConeRows,
    objectives: Vec<LinearObjective>,
    /// Row and sign of each constraint's dual, `None` if some constraint is not a plain row
    dual_rows: Option<Vec<(usize, f64)>>,
}

/// Backend handing conic models to the Clarabel interior point solver
///
/// Only continuous models without SOS constraints are supported.
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    problem: Option<AssembledProblem>,
}

impl ClarabelBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn assemble(model: &ConicModel) -> Result<AssembledProblem, SolverError> {
        if !model.is_continuous() {
            return Err(SolverError::UnsupportedIntegers);
        }
        if !model.sos_constraints().is_empty() {
            return Err(SolverError::UnsupportedSos);
        }
        let num_variables = model.num_variables();
        let mut num_columns = num_variables;
        let mut rows = ConeRows::default();
        let mut dual_rows = Some(Vec::with_capacity(model.constraints().len()));
        for constraint in model.constraints() {
            match constraint.expression().normed() {
                None => {
                    let (row, sign) = Self::add_affine_constraint(model, &mut rows, constraint)?;
                    if let Some(duals) = dual_rows.as_mut() {
                        duals.push((row, sign));
                    }
                }
                Some(_) => {
                    Self::add_normed_constraint(model, &mut rows, &mut num_columns, constraint)?;
                    dual_rows = None;
                }
            }
        }
        for (index, variable) in model.variable_indices().iter().zip(model.variables()) {
            let col = index.slot();
            if variable.lower_bound() != f64::NEG_INFINITY {
                rows.push_linear(&[(col, -1.)], -variable.lower_bound(), LinearCone::Nonnegative);
            }
            if variable.upper_bound() != f64::INFINITY {
                rows.push_linear(&[(col, 1.)], variable.upper_bound(), LinearCone::Nonnegative);
            }
        }
        let mut objectives = Vec::with_capacity(model.objectives().len());
        for objective in model.objectives() {
            objectives.push(LinearObjective {
                sense: objective.sense(),
                coefficients: Self::entries(model, objective.expression(), 1.)?,
                constant: objective.expression().constant(),
            });
        }
        Ok(AssembledProblem {
            num_variables,
            num_columns,
            rows,
            objectives,
            dual_rows,
        })
    }

    /// Columns and coefficients of the linear part, validated against the model
    fn entries(
        model: &ConicModel,
        expression: &AffineExpression<ConicRef>,
        factor: f64,
    ) -> Result<Row, SolverError> {
        let mut entries = Vec::with_capacity(expression.linear().len());
        for term in expression.linear().simplify().terms() {
            model.variable(term.variable)?;
            entries.push((term.variable.slot(), factor * term.scale));
        }
        Ok(entries)
    }

    /// Add the row of an affine constraint, returns the row and the sign mapping clarabel's dual
    /// to this crate's convention
    fn add_affine_constraint(
        model: &ConicModel,
        rows: &mut ConeRows,
        constraint: &ConicConstraint,
    ) -> Result<(usize, f64), SolverError> {
        let affine = constraint.expression().affine();
        let k = affine.constant();
        Ok(match constraint.sense() {
            ConstraintSense::Geq => {
                let entries = Self::entries(model, affine, -1.)?;
                (rows.push_linear(&entries, k, LinearCone::Nonnegative), -1.)
            }
            ConstraintSense::Leq => {
                let entries = Self::entries(model, affine, 1.)?;
                (rows.push_linear(&entries, -k, LinearCone::Nonnegative), 1.)
            }
            ConstraintSense::Eq => {
                let entries = Self::entries(model, affine, -1.)?;
                (rows.push_linear(&entries, k, LinearCone::Zero), -1.)
            }
        })
    }

    /// Add `||rows|| + a'x + k <= 0`
    fn add_normed_constraint(
        model: &ConicModel,
        rows: &mut ConeRows,
        num_columns: &mut usize,
        constraint: &ConicConstraint,
    ) -> Result<(), SolverError> {
        if constraint.sense() != ConstraintSense::Leq {
            return Err(SolverError::NonConvex(constraint.name().to_string()));
        }
        let normed = match constraint.expression().normed() {
            Some(normed) => normed,
            None => return Ok(()),
        };
        let affine = constraint.expression().affine();
        // Bound t = -(a'x + k) in clarabel form: A = a, b = -k
        let bound = Self::entries(model, affine, 1.)?;
        let k = affine.constant();
        match normed.norm() {
            NormKind::Two => {
                let mut cone = vec![(bound, -k)];
                for row in normed.rows() {
                    cone.push((Self::entries(model, row, -1.)?, row.constant()));
                }
                rows.push_soc(cone);
            }
            NormKind::Infinity => {
                for row in normed.rows() {
                    let r = Self::entries(model, row, 1.)?;
                    let c = row.constant();
                    // t - n >= 0 and t + n >= 0
                    let mut minus = bound.clone();
                    minus.extend(r.iter().copied());
                    rows.push_linear(&minus, -k - c, LinearCone::Nonnegative);
                    let mut plus = bound.clone();
                    plus.extend(r.iter().map(|(col, val)| (*col, -val)));
                    rows.push_linear(&plus, -k + c, LinearCone::Nonnegative);
                }
            }
            NormKind::One => {
                let mut total = bound;
                for row in normed.rows() {
                    let aux = *num_columns;
                    *num_columns += 1;
                    let r = Self::entries(model, row, 1.)?;
                    let c = row.constant();
                    // aux - n >= 0
                    let mut minus = vec![(aux, -1.)];
                    minus.extend(r.iter().copied());
                    rows.push_linear(&minus, -c, LinearCone::Nonnegative);
                    // aux + n >= 0
                    let mut plus = vec![(aux, -1.)];
                    plus.extend(r.iter().map(|(col, val)| (*col, -val)));
                    rows.push_linear(&plus, c, LinearCone::Nonnegative);
                    total.push((aux, 1.));
                }
                rows.push_linear(&total, -k, LinearCone::Nonnegative);
            }
        }
        Ok(())
    }

    fn to_clarabel(matrix: CscMatrix<f64>) -> ClarabelCsc<f64> {
        let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
        let (col_offsets, row_indices, values) = matrix.disassemble();
        ClarabelCsc::new(nrows, ncols, col_offsets, row_indices, values)
    }

    /// Solve for one objective with the given rows
    fn solve_single(
        problem: &AssembledProblem,
        rows: &ConeRows,
        objective: Option<&LinearObjective>,
        settings: &SolverSettings,
    ) -> Result<(SolverStatus, Vec<f64>, Vec<f64>, f64), SolverError> {
        let n = problem.num_columns;
        let mut q = vec![0.; n];
        if let Some(objective) = objective {
            let sign = objective.sense.sign();
            for (col, coef) in &objective.coefficients {
                q[*col] += sign * coef;
            }
        }
        let p = ClarabelCsc::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());
        let coo = CooMatrix::try_from_triplets(
            rows.num_rows(),
            n,
            rows.a_rows.clone(),
            rows.a_cols.clone(),
            rows.a_vals.clone(),
        )
        .map_err(|e| SolverError::Backend(e.to_string()))?;
        let a = Self::to_clarabel(CscMatrix::from(&coo));

        let mut builder = DefaultSettingsBuilder::default();
        builder
            .verbose(settings.verbose)
            .tol_gap_abs(settings.tolerance)
            .tol_gap_rel(settings.tolerance)
            .tol_feas(settings.tolerance);
        if let Some(limit) = settings.runtime_limit {
            builder.time_limit(limit);
        }
        if settings.memory_limit.is_some() {
            tracing::debug!("clarabel has no memory limit, ignoring it");
        }
        let clarabel_settings = builder
            .build()
            .map_err(|e| SolverError::Backend(e.to_string()))?;
        let mut solver = DefaultSolver::new(&p, &q, &a, &rows.b, &rows.cones, clarabel_settings);
        solver.solve();
        let solution = &solver.solution;
        Ok((
            solution.status,
            solution.x.clone(),
            solution.z.clone(),
            solution.solve_time,
        ))
    }

    fn map_status(status: SolverStatus) -> OptimizationStatus {
        match status {
            SolverStatus::Solved => OptimizationStatus::Optimal,
            SolverStatus::MaxTime => OptimizationStatus::TimeLimit,
            other => {
                tracing::debug!(status = ?other, "clarabel finished without optimal solution");
                OptimizationStatus::Unsolved
            }
        }
    }
}

impl ConicBackend for ClarabelBackend {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn build(&mut self, model: &ConicModel) -> Result<(), SolverError> {
        self.problem = Some(Self::assemble(model)?);
        Ok(())
    }

    /// Solve every objective in turn, fixing each earlier objective within the objective
    /// tolerance of its optimum
    fn solve(&mut self, settings: &SolverSettings) -> Result<ProblemSolution, SolverError> {
        let problem = self
            .problem
            .as_ref()
            .ok_or_else(|| SolverError::Backend("solve called before build".to_string()))?;
        let mut rows = problem.rows.clone();
        let mut runtime = 0.;
        let mut last = None;
        let passes: Vec<Option<&LinearObjective>> = if problem.objectives.is_empty() {
            vec![None]
        } else {
            problem.objectives.iter().map(Some).collect()
        };
        let num_passes = passes.len();
        for (pass, objective) in passes.into_iter().enumerate() {
            let (status, x, z, time) = Self::solve_single(problem, &rows, objective, settings)?;
            runtime += time;
            let status = Self::map_status(status);
            if status != OptimizationStatus::Optimal {
                return Ok(ProblemSolution::unsolved(status, runtime));
            }
            if let Some(objective) = objective {
                if pass + 1 < num_passes {
                    let optimum = objective.value(&x);
                    let slack = settings.objective_tolerance * optimum.abs().max(1.);
                    match objective.sense {
                        ObjectiveSense::Minimize => rows.push_linear(
                            &objective.coefficients,
                            optimum + slack - objective.constant,
                            LinearCone::Nonnegative,
                        ),
                        ObjectiveSense::Maximize => {
                            let negated: Row = objective
                                .coefficients
                                .iter()
                                .map(|(col, val)| (*col, -val))
                                .collect();
                            rows.push_linear(
                                &negated,
                                objective.constant - optimum + slack,
                                LinearCone::Nonnegative,
                            )
                        }
                    };
                }
            }
            last = Some((x, z));
        }
        let (x, z) = match last {
            Some(solution) => solution,
            None => return Ok(ProblemSolution::unsolved(OptimizationStatus::Unsolved, runtime)),
        };
        let values = x[..problem.num_variables].to_vec();
        let objective_value = problem.objectives.first().map(|o| o.value(&x));
        let dual_values = match (&problem.dual_rows, num_passes) {
            (Some(dual_rows), 1) => Some(
                dual_rows
                    .iter()
                    .map(|(row, sign)| sign * z[*row])
                    .collect(),
            ),
            _ => None,
        };
        Ok(ProblemSolution {
            status: OptimizationStatus::Optimal,
            objective_value,
            variable_values: Some(values),
            dual_values,
            runtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ConicExpression;
    use crate::optimize::objective::Objective;
    use crate::optimize::solvers::ConicSolver;
    use crate::optimize::variable::VariableType;

    #[test]
    fn linear_program() {
        // min x + 2y s.t. x + y >= 1, x <= 0.25, x, y >= 0
        let mut model = ConicModel::new("lp");
        let x = model.add_variable("x", 0., 0.25).unwrap();
        let y = model.add_variable("y", 0., f64::INFINITY).unwrap();
        model.add_constraint(
            "cover",
            AffineExpression::variable(x).add_term(1., y).geq_value(1.),
        );
        model.add_objective(Objective::minimize(
            AffineExpression::variable(x).add_term(2., y),
        ));
        let mut solver = ConicSolver::default();
        let status = solver.solve(&mut model).unwrap();
        assert_eq!(status, OptimizationStatus::Optimal);
        assert!((solver.value(&model, x).unwrap() - 0.25).abs() < 1e-5);
        assert!((solver.value(&model, y).unwrap() - 0.75).abs() < 1e-5);
        assert!((solver.objective_value() - 1.75).abs() < 1e-5);
        // Dual of a binding >= constraint is non-positive, total sensitivity is -2
        assert!((model.constraints()[0].dual_value().unwrap() + 2.).abs() < 1e-5);
    }

    #[test]
    fn second_order_cone() {
        // max x + y s.t. ||(x, y)||_2 <= 1
        let mut model = ConicModel::new("soc");
        let x = model.add_variable("x", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        let y = model.add_variable("y", f64::NEG_INFINITY, f64::INFINITY).unwrap();
        model.add_constraint(
            "ball",
            ConicExpression::norm_of(&[x, y], NormKind::Two).leq_value(1.),
        );
        model.add_objective(Objective::maximize(
            AffineExpression::variable(x).add_term(1., y),
        ));
        let mut solver = ConicSolver::default();
        solver.solve(&mut model).unwrap();
        assert!((solver.objective_value() - 2f64.sqrt()).abs() < 1e-5);
        assert!(!model.constraints()[0].has_dual_value());
    }

    #[test]
    fn one_and_infinity_norms() {
        // max x + 2y s.t. ||(x, y)||_1 <= 1 gives 2, ||(x, y)||_inf <= 1 gives 3
        for (norm, expected) in [(NormKind::One, 2.), (NormKind::Infinity, 3.)] {
            let mut model = ConicModel::new("norm");
            let x = model.add_variable("x", f64::NEG_INFINITY, f64::INFINITY).unwrap();
            let y = model.add_variable("y", f64::NEG_INFINITY, f64::INFINITY).unwrap();
            model.add_constraint("n", ConicExpression::norm_of(&[x, y], norm).leq_value(1.));
            model.add_objective(Objective::maximize(
                AffineExpression::variable(x).add_term(2., y),
            ));
            let mut solver = ConicSolver::default();
            solver.solve(&mut model).unwrap();
            assert!((solver.objective_value() - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn hierarchical_objectives() {
        // First maximize x + y on the unit box, then minimize x among those optima
        let mut model = ConicModel::new("multi");
        let x = model.add_variable("x", 0., 1.).unwrap();
        let y = model.add_variable("y", 0., 1.).unwrap();
        model.add_constraint(
            "sum",
            AffineExpression::variable(x).add_term(1., y).leq_value(1.),
        );
        model.add_objective(Objective::maximize(
            AffineExpression::variable(x).add_term(1., y),
        ));
        model.add_objective(Objective::minimize(AffineExpression::variable(x)));
        let mut solver = ConicSolver::default();
        solver.solve(&mut model).unwrap();
        assert!((solver.objective_value() - 1.).abs() < 1e-5);
        assert!(solver.value(&model, x).unwrap().abs() < 1e-4);
        assert!((solver.value(&model, y).unwrap() - 1.).abs() < 1e-4);
    }

    #[test]
    fn unsupported_models() {
        let mut model = ConicModel::new("int");
        model
            .add_variable_of_type("z", 0., 3., VariableType::Integer)
            .unwrap();
        if let Err(SolverError::UnsupportedIntegers) = ClarabelBackend::new().build(&model) {
            // Intentionally blank
        } else {
            panic!("Integer variables accepted")
        }

        let mut model = ConicModel::new("nonconvex");
        let x = model.add_variable("x", 0., 1.).unwrap();
        model.add_constraint(
            "bad",
            ConicExpression::norm_of(&[x], NormKind::Two).geq_value(1.),
        );
        if let Err(SolverError::NonConvex(name)) = ClarabelBackend::new().build(&model) {
            assert_eq!(name, "bad");
        } else {
            panic!("Reverse cone constraint accepted")
        }
    }
}
