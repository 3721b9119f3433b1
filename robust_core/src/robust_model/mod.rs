//! Robust optimization models: decisions, uncertainties, uncertainty sets and realizations
pub mod decision;
pub mod expectation;
pub mod model;
pub mod realization;
pub mod uncertainty;
pub mod uncertainty_set;

use thiserror::Error;

use crate::utils::store::StoreError;

pub use decision::{AffineSolution, DecisionRef, DecisionVariable};
pub use expectation::{EmpiricalExpectationProvider, ExpectationProvider};
pub use model::RoModel;
pub use realization::{SolutionRealization, UncertaintyRealization};
pub use uncertainty::{UncertaintyRef, UncertaintyScaledDecision, UncertaintyVariable};
pub use uncertainty_set::{ConstraintSetRef, SpecialSetType, UncertaintySet};

/// Errors associated with building and evaluating models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Error when an index can't be resolved in its store
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Error when an operation needs the objective before it was set
    #[error("The model has no objective")]
    MissingObjective,
    /// Error when a stochastic expression is compiled without an expectation provider
    #[error("The model has no expectation provider")]
    MissingExpectationProvider,
    /// Error when a solution value is requested that does not exist
    #[error("No solution value for {0}")]
    MissingSolution(String),
    /// Error when accessing a constraint position that does not exist
    #[error("No constraint at position {0}")]
    MissingConstraint(usize),
    /// Error when the dual of a conic model is requested before it was computed
    #[error("The dual model has not been computed")]
    MissingDual,
    /// Error when trying to add variable with invalid bounds
    #[error("Tried to add a variable with lower_bound > upper_bound")]
    InvalidVariableBounds,
    /// Error when a realization has the wrong number of entries
    #[error("Expected {expected} values but found {found}")]
    RealizationDimension { expected: usize, found: usize },
    /// Error when an empirical distribution is built from no realizations
    #[error("Can't build an empirical distribution from zero realizations")]
    EmptyRealizations,
    /// Error when vector or matrix valued expectations disagree in shape
    #[error("Expected values of differently shaped results can't be averaged")]
    InconsistentExpectationShape,
    /// Error when an operation is not defined for the shape of the uncertainty set
    #[error("Unsupported uncertainty set: {0}")]
    UnsupportedSetShape(String),
    /// Error when asking for more active variables than the set has
    #[error("Can't have {k} of {n} variables active")]
    TooManyActive { k: usize, n: usize },
    /// Error when sampling from a set with unbounded variables
    #[error("Sampling requires bounded uncertainty variables")]
    UnboundedSampling,
    /// Error when sampling gave up before finding a sample inside the bounds
    #[error("Could not generate a sample inside the variable bounds")]
    InvalidSample,
    /// Error when an operation needs exactly one constraint set
    #[error("Expected a single constraint set but found {0}")]
    MultipleConstraintSets(usize),
    /// Error when a norm is bounded from below or fixed
    #[error("Constraint {0} is not convex")]
    NonConvexConstraint(String),
    /// Error when computing the dual of a model with integer variables or SOS constraints
    #[error("Duals can only be computed for continuous models without SOS constraints")]
    DualUnsupported,
    /// Error when scaling a norm by a negative factor
    #[error("Can't scale a norm by the negative factor {0}")]
    NegativeNormScale(f64),
    /// Error when no special constraint exists for a set type
    #[error("No special constraint exists for {0} sets")]
    NoSpecialConstraint(String),
}
