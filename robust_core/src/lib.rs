//! Core rust implementation of robust_core, a crate for robust optimization with adjustable
//! decisions.
//!
//! Robust models are built from decision and uncertainty variables in a [`robust_model::RoModel`],
//! then compiled into a deterministic [`optimize::conic_model::ConicModel`] by one of the policy
//! compilers in [`policy`], and solved through a conic backend.
//!
//! # Examples
//! ```rust
//! use robust_core::expression::RoExpression;
//! use robust_core::optimize::objective::Objective;
//! use robust_core::policy::AffinePolicyCompiler;
//! use robust_core::robust_model::RoModel;
//!
//! let mut model = RoModel::new("hedge");
//! let u = model.add_uncertainty_variable("u", Some(0), -1., 1.).unwrap();
//! let x = model.add_decision_variable("x", Some(0), 0., 10.).unwrap();
//! let cover = RoExpression::decision(x).sub(&RoExpression::uncertainty(u));
//! model.add_constraint("cover", cover.geq_value(0.));
//! model.set_objective(Objective::minimize(RoExpression::decision(x)));
//! let mut compiler = AffinePolicyCompiler::new(&model);
//! compiler.solve().unwrap();
//! assert!(compiler.has_solution());
//! assert!((compiler.objective_value() - 1.).abs() < 1e-5);
//! ```

pub mod configuration;
pub mod expression;
pub mod io;
pub mod optimize;
pub mod policy;
pub mod robust_model;
pub mod utils;
