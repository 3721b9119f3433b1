//! Solver boundary for conic models
//!
//! A [`ConicSolver`] drives a [`ConicBackend`] through the states
//! `Unbuilt -> Built -> Solved(status)`, and copies solutions back into the [`ConicModel`].
pub mod clarabel;

use derive_builder::Builder;
use thiserror::Error;

use crate::configuration;
use crate::optimize::conic_model::ConicModel;
use crate::optimize::variable::ConicRef;
use crate::optimize::{OptimizationStatus, ProblemSolution};
use crate::robust_model::ModelError;

pub use self::clarabel::ClarabelBackend;

/// Parameters of a single solve
///
/// # Examples
/// ```rust
/// use robust_core::optimize::solvers::SolverSettingsBuilder;
/// let settings = SolverSettingsBuilder::default()
///     .runtime_limit(10.)
///     .verbose(false)
///     .build()
///     .unwrap();
/// assert_eq!(settings.runtime_limit, Some(10.));
/// assert_eq!(settings.memory_limit, None);
/// ```
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// Wall clock limit in seconds
    #[builder(default = "None", setter(strip_option))]
    pub runtime_limit: Option<f64>,
    /// Memory limit in GB
    #[builder(default = "None", setter(strip_option))]
    pub memory_limit: Option<f64>,
    /// Whether the backend prints its progress
    #[builder(default = "configuration::current().verbose")]
    pub verbose: bool,
    /// Gap and feasibility tolerance of the backend
    #[builder(default = "configuration::current().solver_tolerance")]
    pub tolerance: f64,
    /// Relative slack when fixing earlier objectives of a multi-objective model
    #[builder(default = "configuration::current().objective_tolerance")]
    pub objective_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        let config = configuration::current();
        Self {
            runtime_limit: None,
            memory_limit: None,
            verbose: config.verbose,
            tolerance: config.solver_tolerance,
            objective_tolerance: config.objective_tolerance,
        }
    }
}

/// A numerical conic solver
pub trait ConicBackend {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Translate the model into the backend's own representation
    fn build(&mut self, model: &ConicModel) -> Result<(), SolverError>;

    /// Bring the backend's representation up to date after the model changed
    fn update(&mut self, model: &ConicModel) -> Result<(), SolverError> {
        self.build(model)
    }

    /// Solve the last built representation
    fn solve(&mut self, settings: &SolverSettings) -> Result<ProblemSolution, SolverError>;
}

/// Lifecycle of a [`ConicSolver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Unbuilt,
    Built,
    Solved(OptimizationStatus),
}

/// Build and solve a conic model with a backend
#[derive(Debug, Clone)]
pub struct ConicSolver<B: ConicBackend> {
    backend: B,
    settings: SolverSettings,
    state: SolverState,
    runtime: Option<f64>,
    objective_value: Option<f64>,
}

impl Default for ConicSolver<ClarabelBackend> {
    fn default() -> Self {
        Self::new(ClarabelBackend::default())
    }
}

impl<B: ConicBackend> ConicSolver<B> {
    pub fn new(backend: B) -> Self {
        Self::with_settings(backend, SolverSettings::default())
    }

    pub fn with_settings(backend: B, settings: SolverSettings) -> Self {
        Self {
            backend,
            settings,
            state: SolverState::Unbuilt,
            runtime: None,
            objective_value: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // region Settings
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SolverSettings) {
        self.settings = settings;
    }

    /// Runtime limit in seconds, `None` removes the limit
    pub fn set_runtime_limit(&mut self, limit: impl Into<Option<f64>>) {
        self.settings.runtime_limit = limit.into();
    }

    /// Memory limit in GB, `None` removes the limit
    pub fn set_memory_limit(&mut self, limit: impl Into<Option<f64>>) {
        self.settings.memory_limit = limit.into();
    }
    // endregion Settings

    // region Lifecycle
    /// Translate the model for the backend, may only be called once
    pub fn build(&mut self, model: &ConicModel) -> Result<(), SolverError> {
        if self.state != SolverState::Unbuilt {
            return Err(SolverError::AlreadyBuilt);
        }
        self.backend.build(model)?;
        tracing::debug!(
            backend = self.backend.name(),
            variables = model.num_variables(),
            constraints = model.constraints().len(),
            "built conic model"
        );
        self.state = SolverState::Built;
        Ok(())
    }

    /// Build if needed, otherwise update the backend, then solve and store the solution in the
    /// model
    ///
    /// # Returns
    /// The status reported by the backend, limits being hit are not errors
    pub fn solve(&mut self, model: &mut ConicModel) -> Result<OptimizationStatus, SolverError> {
        if self.state == SolverState::Unbuilt {
            self.build(model)?;
        } else {
            self.backend.update(model)?;
        }
        model.invalidate_solution();
        self.objective_value = None;
        let solution = self.backend.solve(&self.settings)?;
        self.runtime = Some(solution.runtime);
        if solution.status == OptimizationStatus::Optimal {
            if let Some(values) = &solution.variable_values {
                model.set_solution(values)?;
                self.objective_value = solution.objective_value;
                if model.all_affine() && !model.is_multi_objective() && model.is_continuous() {
                    if let Some(duals) = &solution.dual_values {
                        model.set_constraint_duals(duals)?;
                    }
                }
            }
        }
        tracing::info!(
            backend = self.backend.name(),
            status = %solution.status,
            runtime = solution.runtime,
            "solved conic model"
        );
        self.state = SolverState::Solved(solution.status);
        Ok(solution.status)
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        self.state != SolverState::Unbuilt
    }
    // endregion Lifecycle

    // region Results
    pub fn status(&self) -> OptimizationStatus {
        match self.state {
            SolverState::Solved(status) => status,
            _ => OptimizationStatus::Unsolved,
        }
    }

    /// Whether the last solve reached optimality
    pub fn has_solution(&self) -> bool {
        self.status() == OptimizationStatus::Optimal
    }

    /// Runtime of the last solve in seconds, NaN before any solve
    pub fn runtime(&self) -> f64 {
        self.runtime.unwrap_or(f64::NAN)
    }

    /// Objective value of the last solve, NaN without a solution
    pub fn objective_value(&self) -> f64 {
        match self.objective_value {
            Some(value) if self.has_solution() => value,
            _ => f64::NAN,
        }
    }

    /// Solution value of a conic variable
    pub fn value(&self, model: &ConicModel, variable: ConicRef) -> Result<f64, SolverError> {
        if !self.has_solution() {
            return Err(SolverError::NoSolution);
        }
        Ok(model.variable(variable)?.value()?)
    }
    // endregion Results
}

/// Errors associated with building and solving conic models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Error when building a solver a second time
    #[error("The solver has already been built")]
    AlreadyBuilt,
    /// Error when reading solution values without an optimal solution
    #[error("No optimal solution available")]
    NoSolution,
    /// Error reported by the numerical backend
    #[error("Backend failure: {0}")]
    Backend(String),
    /// Error when the backend can't handle integer or binary variables
    #[error("The backend does not support integer variables")]
    UnsupportedIntegers,
    /// Error when the backend can't handle SOS constraints
    #[error("The backend does not support SOS constraints")]
    UnsupportedSos,
    /// Error when a norm appears on the wrong side of a constraint
    #[error("Constraint {0} is not convex")]
    NonConvex(String),
    /// Error in the model being solved
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<crate::utils::store::StoreError> for SolverError {
    fn from(value: crate::utils::store::StoreError) -> Self {
        SolverError::Model(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::AffineExpression;
    use crate::optimize::objective::Objective;

    /// Backend returning a preset solution
    #[derive(Debug, Clone)]
    struct FixedBackend {
        builds: usize,
        solution: ProblemSolution,
    }

    impl ConicBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn build(&mut self, _model: &ConicModel) -> Result<(), SolverError> {
            self.builds += 1;
            Ok(())
        }

        fn solve(&mut self, _settings: &SolverSettings) -> Result<ProblemSolution, SolverError> {
            Ok(self.solution.clone())
        }
    }

    fn model() -> (ConicModel, ConicRef) {
        let mut model = ConicModel::new("m");
        let x = model.add_variable("x", 0., 1.).unwrap();
        model.add_constraint("c", AffineExpression::variable(x).geq_value(0.5));
        model.add_objective(Objective::minimize(AffineExpression::variable(x)));
        (model, x)
    }

    fn optimal() -> ProblemSolution {
        ProblemSolution {
            status: OptimizationStatus::Optimal,
            objective_value: Some(0.5),
            variable_values: Some(vec![0.5]),
            dual_values: Some(vec![-1.]),
            runtime: 0.1,
        }
    }

    #[test]
    fn state_machine() {
        let (mut model, x) = model();
        let mut solver = ConicSolver::new(FixedBackend {
            builds: 0,
            solution: optimal(),
        });
        assert_eq!(solver.state(), SolverState::Unbuilt);
        assert!(solver.runtime().is_nan());
        assert!(solver.objective_value().is_nan());
        solver.build(&model).unwrap();
        assert_eq!(solver.state(), SolverState::Built);
        if let Err(SolverError::AlreadyBuilt) = solver.build(&model) {
            // Intentionally blank
        } else {
            panic!("Solver built twice")
        }
        let status = solver.solve(&mut model).unwrap();
        assert_eq!(status, OptimizationStatus::Optimal);
        assert_eq!(solver.state(), SolverState::Solved(OptimizationStatus::Optimal));
        assert!(solver.has_solution());
        assert!((solver.value(&model, x).unwrap() - 0.5).abs() < 1e-25);
        assert!((solver.objective_value() - 0.5).abs() < 1e-25);
        assert!((model.constraints()[0].dual_value().unwrap() + 1.).abs() < 1e-25);
    }

    #[test]
    fn limits_are_statuses() {
        let (mut model, x) = model();
        let mut solver = ConicSolver::new(FixedBackend {
            builds: 0,
            solution: ProblemSolution::unsolved(OptimizationStatus::TimeLimit, 2.),
        });
        solver.set_runtime_limit(2.);
        assert_eq!(solver.settings().runtime_limit, Some(2.));
        let status = solver.solve(&mut model).unwrap();
        assert_eq!(status, OptimizationStatus::TimeLimit);
        assert_eq!(solver.backend().builds, 1);
        assert!(!solver.has_solution());
        assert!(solver.objective_value().is_nan());
        assert!((solver.runtime() - 2.).abs() < 1e-25);
        assert!(solver.value(&model, x).is_err());
    }

    #[test]
    fn resolve_updates_backend() {
        let (mut model, _) = model();
        let mut solver = ConicSolver::new(FixedBackend {
            builds: 0,
            solution: optimal(),
        });
        solver.solve(&mut model).unwrap();
        solver.solve(&mut model).unwrap();
        // The default update rebuilds
        assert_eq!(solver.backend().builds, 2);
        solver.set_memory_limit(None::<f64>);
        assert_eq!(solver.settings().memory_limit, None);
    }
}
