//! Arena storage and diagnostics shared by the modeling layers
pub mod diagnostics;
pub mod store;
