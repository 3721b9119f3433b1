//! Module for reading and writing realizations and solved policies
pub mod json;

pub use json::{
    policy_to_json, read_realizations, realizations_from_json, realizations_to_json,
    write_realizations, JsonError, JsonPolicy,
};
