//! RNS variant of the CKKS approximate homomorphic encryption scheme.

mod approx_modulus_switch;
pub mod context;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod key;
pub mod params;
pub mod plaintext;
mod sampling;
pub mod scheme;
pub(crate) mod utils;

pub use context::Context;
pub use encoder::Encoder;
pub use engine::CkksEngine;
pub use error::{CkksError, Result};
pub use key::{EvaluationKeys, KeyManager, PublicKey};
pub use params::{SchemeParameters, SchemeParametersBuilder, SecurityLevel};
pub use plaintext::{Ciphertext, Plaintext};
pub use scheme::Evaluator;
