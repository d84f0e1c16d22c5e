//! Profile Pod CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the profile pod operator.

pub mod labels;
pub mod podflame;

pub use labels::*;
pub use podflame::*;
