pub mod ckks;
mod math;

pub use ckks::{CkksEngine, CkksError, SchemeParameters, SecurityLevel};
