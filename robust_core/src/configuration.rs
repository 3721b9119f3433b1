//! Process wide defaults used when building robust models and solvers
use std::sync::{LazyLock, RwLock};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

/// Default values read when a model, solver or compiler is created
///
/// Changing the configuration only affects objects created afterwards, anything already built
/// keeps the values it read at construction.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Tolerance used by feasibility checks of solution realizations
    pub feasibility_tolerance: f64,
    /// Gap and feasibility tolerance handed to the conic solver
    pub solver_tolerance: f64,
    /// Relative slack used to fix earlier objectives in hierarchical multi-objective solves
    pub objective_tolerance: f64,
    /// Whether the conic solver should print its progress
    pub verbose: bool,
    /// Solver backend to use
    pub solver: Solver,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            feasibility_tolerance: 1e-3,
            solver_tolerance: 1e-07,
            objective_tolerance: 1e-06,
            verbose: false,
            solver: Solver::Clarabel,
        }
    }
}

/// Enum used to specify the default solver to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    /// Use the Clarabel interior point solver
    Clarabel,
}

/// Read a copy of the current configuration
///
/// A poisoned lock is read through, the configuration has no invariants to break.
pub fn current() -> Configuration {
    match CONFIGURATION.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}
