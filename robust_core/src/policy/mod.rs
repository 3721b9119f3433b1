//! Compilers turning robust models into deterministic conic models
//!
//! The [`AffinePolicyCompiler`] restricts every decision to an affine function of the
//! uncertainties it depends on and replaces uncertain terms by their robust counterparts. The
//! [`LiftingCompiler`] splits uncertainty variables at breakpoints first, yielding piecewise
//! affine policies.
pub mod affine;
pub mod breakpoints;
pub mod lifting;

use thiserror::Error;

use crate::optimize::solvers::SolverError;
use crate::robust_model::ModelError;
use crate::utils::store::StoreError;

pub use affine::AffinePolicyCompiler;
pub use breakpoints::BreakpointSeries;
pub use lifting::{LiftedExpectationProvider, LiftingCompiler, LiftingOptions, LiftingOptionsBuilder};

/// Errors associated with compiling robust models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// Error when an equality constraint has STOCHASTIC uncertainty mode
    #[error("Equality constraint {0} can't be compiled in STOCHASTIC mode")]
    EqualityUnderStochastic(String),
    /// Error when an uncertainty scaled decision refers to an adjustable decision
    #[error("Uncertainty scaled decisions are only supported for decisions without dependencies, {0} has dependencies")]
    ScaledDecisionOnAdjustable(String),
    /// Error when a breakpoint direction is not a single uncertainty variable
    #[error("Only simple axis aligned breakpoint directions are supported")]
    NotAxisAligned,
    /// Error when two breakpoint series lift the same uncertainty variable
    #[error("Uncertainty variable {0} already has breakpoints")]
    DuplicateBreakpointDirection(String),
    /// Error when breakpoints are not sorted increasingly
    #[error("Breakpoints have to be increasing")]
    UnorderedBreakpoints,
    /// Error when a breakpoint direction has an infinite lower or upper bound
    #[error("Breakpoint directions have to be bounded")]
    UnboundedDirection,
    /// Error when the uncertainty set does not allow kappa induced breakpoints
    #[error("Kappa induced breakpoints are not available: {0}")]
    KappaRequirements(String),
    /// Error when an operation needs the compiled conic model
    #[error("The compiler has not been built")]
    NotBuilt,
    /// Error when building or solving the compiled conic model
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// Error in the robust or conic model
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Error when an index can't be resolved in its store
    #[error(transparent)]
    Store(#[from] StoreError),
}
