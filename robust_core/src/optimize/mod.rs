//! Module for constructing and solving deterministic conic optimization problems

pub mod conic_model;
pub mod constraint;
pub mod objective;
pub mod solvers;
pub mod variable;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Status of an optimization problem after a solve
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizationStatus {
    /// No usable solution was found, or the problem has not been solved yet
    Unsolved,
    /// Problem has been optimized
    Optimal,
    /// The solver stopped at the runtime limit
    TimeLimit,
    /// The solver stopped at the memory limit
    MemoryLimit,
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationStatus::Unsolved => write!(f, "UNSOLVED"),
            OptimizationStatus::Optimal => write!(f, "OPTIMAL"),
            OptimizationStatus::TimeLimit => write!(f, "TIME_LIMIT"),
            OptimizationStatus::MemoryLimit => write!(f, "MEMORY_LIMIT"),
        }
    }
}

/// Struct representing the raw result of a backend solve
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemSolution {
    /// The status of the optimization problem, representing if the optimization was
    /// completed successfully
    pub status: OptimizationStatus,
    /// Optimized value of the primary objective
    ///
    /// Some(f64) if the optimization was completed successfully, None otherwise
    pub objective_value: Option<f64>,
    /// Values of the variables at the optimum, one per conic variable in insertion order
    pub variable_values: Option<Vec<f64>>,
    /// Values of the dual variables at the optimum
    ///
    /// Some(Vec), one per constraint, if the problem could be solved and the backend could
    /// recover the dual values, None otherwise
    pub dual_values: Option<Vec<f64>>,
    /// Wall clock time spent in the backend, in seconds
    pub runtime: f64,
}

impl ProblemSolution {
    /// Solution without any values
    pub fn unsolved(status: OptimizationStatus, runtime: f64) -> Self {
        Self {
            status,
            objective_value: None,
            variable_values: None,
            dual_values: None,
            runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", OptimizationStatus::TimeLimit), "TIME_LIMIT");
        let solution = ProblemSolution::unsolved(OptimizationStatus::Unsolved, 0.5);
        assert!(solution.variable_values.is_none());
        assert!((solution.runtime - 0.5).abs() < 1e-25);
    }
}
