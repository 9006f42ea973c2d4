use std::sync::Arc;

use num_complex::Complex64;
use tracing::info;

use super::{
    context::Context,
    encoder::Encoder,
    error::{CkksError, Result},
    key::KeyManager,
    params::SchemeParameters,
    plaintext::Ciphertext,
    scheme::Evaluator,
};

struct EngineState {
    context: Arc<Context>,
    encoder: Encoder,
    keys: KeyManager,
    evaluator: Evaluator,
}

/// Single entry point: generate keys once, then encrypt, evaluate and
/// decrypt. Every operation before [`CkksEngine::key_gen`] fails with
/// [`CkksError::UninitializedContext`].
#[derive(Default)]
pub struct CkksEngine {
    state: Option<EngineState>,
}

impl CkksEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context for 128-bit classical security together with the
    /// key pair, the relinearization key and every power-of-two rotation
    /// key. Replaces whatever was generated before.
    pub fn key_gen(&mut self, mult_depth: usize, scale_factor_bits: u32, batch_size: usize) -> Result<()> {
        let params = SchemeParameters::new(mult_depth, scale_factor_bits, batch_size)?;
        self.key_gen_with(params)
    }

    pub fn key_gen_with(&mut self, params: SchemeParameters) -> Result<()> {
        info!(
            mult_depth = params.mult_depth(),
            scale_factor_bits = params.scale_factor_bits(),
            batch_size = params.batch_size(),
            ring_dimension = params.ring_dimension(),
            security_level = ?params.security_level(),
            "generating CKKS keys"
        );
        let context = Arc::new(Context::new(&params)?);

        let mut keys = KeyManager::new(Arc::clone(&context));
        keys.add_relinearization_key();
        keys.add_rotation_keys(params.slots());

        let encoder = Encoder::new(Arc::clone(&context));
        let evaluator = Evaluator::new(Arc::clone(&context), keys.evaluation_keys());
        self.state = Some(EngineState {
            context,
            encoder,
            keys,
            evaluator,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn params(&self) -> Result<&SchemeParameters> {
        Ok(self.state()?.context.params())
    }

    /// Shareable handle on the homomorphic operators, e.g. for other threads.
    pub fn evaluator(&self) -> Result<Evaluator> {
        Ok(self.state()?.evaluator.clone())
    }

    /// Encodes at the top level with the default scale and encrypts with
    /// the public key.
    pub fn encrypt(&self, values: &[f64]) -> Result<Ciphertext> {
        let values: Vec<_> = values.iter().map(|x| Complex64::new(*x, 0.0)).collect();
        self.encrypt_complex(&values)
    }

    pub fn encrypt_complex(&self, values: &[Complex64]) -> Result<Ciphertext> {
        let state = self.state()?;
        let plaintext = state.encoder.encode(
            values,
            state.context.max_level(),
            state.encoder.default_scale(),
        )?;
        Ok(state.keys.encrypt(&plaintext))
    }

    /// Real parts of the first `batch_size` slots. Approximate.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Vec<f64>> {
        Ok(self
            .decrypt_complex(ciphertext)?
            .iter()
            .map(|c| c.re)
            .collect())
    }

    pub fn decrypt_complex(&self, ciphertext: &Ciphertext) -> Result<Vec<Complex64>> {
        let state = self.state()?;
        let plaintext = state.keys.decrypt(ciphertext)?;
        let mut values = state.encoder.decode(&plaintext);
        values.truncate(state.context.params().batch_size());
        Ok(values)
    }

    pub fn eval_add(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<Ciphertext> {
        self.state()?.evaluator.add(ct1, ct2)
    }

    pub fn eval_sub(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<Ciphertext> {
        self.state()?.evaluator.sub(ct1, ct2)
    }

    pub fn eval_negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.state()?.evaluator.negate(ct)
    }

    pub fn eval_add_const(&self, ct: &Ciphertext, constant: f64) -> Result<Ciphertext> {
        self.state()?.evaluator.add_const(ct, constant)
    }

    pub fn eval_mult(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<Ciphertext> {
        self.state()?.evaluator.mul(ct1, ct2)
    }

    pub fn eval_mult_const(&self, ct: &Ciphertext, constants: &[f64]) -> Result<Ciphertext> {
        self.state()?.evaluator.mul_const(ct, constants)
    }

    pub fn eval_sum(&self, ct: &Ciphertext, batch_size: usize) -> Result<Ciphertext> {
        self.state()?.evaluator.sum(ct, batch_size)
    }

    pub fn eval_rotate(&self, ct: &Ciphertext, shift: isize) -> Result<Ciphertext> {
        self.state()?.evaluator.rotate(ct, shift)
    }

    pub fn mod_down_to(&self, ct: &Ciphertext, level: usize) -> Result<Ciphertext> {
        self.state()?.evaluator.mod_down_to(ct, level)
    }

    fn state(&self) -> Result<&EngineState> {
        self.state.as_ref().ok_or(CkksError::UninitializedContext)
    }
}
