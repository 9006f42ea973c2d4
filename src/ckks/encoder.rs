use std::sync::Arc;

use num_complex::Complex64;

use super::{
    context::Context,
    error::{CkksError, Result},
    plaintext::Plaintext,
};

/// Encoded coefficients must stay well inside i128.
const MAX_ENCODED_MAGNITUDE: f64 = 1.7e38;

/// Packs complex vectors into plaintext polynomials through the canonical
/// embedding. With `slots` < N/2 the packing is sparse: coefficient i * gap
/// carries the real part of slot i and coefficient i * gap + N/2 its
/// imaginary part, with gap = N / (2 * slots).
#[derive(Clone)]
pub struct Encoder {
    context: Arc<Context>,
}

impl Encoder {
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    pub fn slots(&self) -> usize {
        self.context.params().slots()
    }

    /// The scale fresh plaintexts are encoded with, 2^scale_factor_bits.
    pub fn default_scale(&self) -> f64 {
        self.context.params().scale()
    }

    /// Encodes at most `batch_size` values at `level` with the given scale.
    /// Unused slots are zero.
    pub fn encode(&self, values: &[Complex64], level: usize, scale: f64) -> Result<Plaintext> {
        let batch_size = self.context.params().batch_size();
        if values.len() > batch_size {
            return Err(CkksError::InvalidInput(format!(
                "{} values exceed the batch size {}",
                values.len(),
                batch_size
            )));
        }
        if level > self.context.max_level() {
            return Err(CkksError::InvalidInput(format!(
                "level {} is above the top of the chain {}",
                level,
                self.context.max_level()
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(CkksError::InvalidInput(format!("invalid scale {}", scale)));
        }

        let n = self.context.ring_dimension();
        let slots = self.slots();
        let gap = n / 2 / slots;

        let mut uvals = vec![Complex64::new(0.0, 0.0); slots];
        uvals[..values.len()].copy_from_slice(values);
        self.context.fft.inverse(&mut uvals);

        let bound = coefficient_bound(&self.context, level);
        let mut coeffs = vec![0i128; n];
        for (i, v) in uvals.iter().enumerate() {
            coeffs[i * gap] = scale_up(v.re, scale, bound)?;
            coeffs[i * gap + n / 2] = scale_up(v.im, scale, bound)?;
        }

        Ok(Plaintext {
            msg: self.context.from_signed(&coeffs, level + 1, 0),
            slots,
            level,
            scale,
        })
    }

    pub fn encode_real(&self, values: &[f64], level: usize, scale: f64) -> Result<Plaintext> {
        let values: Vec<_> = values.iter().map(|x| Complex64::new(*x, 0.0)).collect();
        self.encode(&values, level, scale)
    }

    /// Returns exactly `slots` values, dividing by the plaintext's scale.
    pub fn decode(&self, plaintext: &Plaintext) -> Vec<Complex64> {
        let n = self.context.ring_dimension();
        let gap = n / 2 / plaintext.slots;
        let coeffs = self
            .context
            .to_signed_coeffs(&plaintext.msg, plaintext.level + 1);

        let mut vals: Vec<_> = (0..plaintext.slots)
            .map(|i| {
                Complex64::new(
                    coeffs[i * gap] / plaintext.scale,
                    coeffs[i * gap + n / 2] / plaintext.scale,
                )
            })
            .collect();
        self.context.fft.forward(&mut vals);
        vals
    }
}

/// Largest coefficient magnitude representable at `level`: half of
/// q_0 * ... * q_level, capped by what fits an i128.
pub(crate) fn coefficient_bound(context: &Context, level: usize) -> f64 {
    let half_modulus = context.moduli()[..=level]
        .iter()
        .map(|q| *q as f64)
        .product::<f64>()
        / 2.0;
    half_modulus.min(MAX_ENCODED_MAGNITUDE)
}

pub(crate) fn scale_up(x: f64, scale: f64, bound: f64) -> Result<i128> {
    let y = (x * scale).round();
    if !y.is_finite() || y.abs() >= bound {
        return Err(CkksError::InvalidInput(format!(
            "value {} cannot be encoded at scale {}",
            x, scale
        )));
    }
    Ok(y as i128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::{
        params::{SchemeParameters, SecurityLevel},
        utils::{equal_up_to_epsilon, gen_random_complex_vector},
    };

    fn encoder(batch_size: usize) -> Encoder {
        let params = SchemeParameters::builder(1, 40, batch_size)
            .security_level(SecurityLevel::NotSet)
            .ring_dimension(1 << 10)
            .build()
            .unwrap();
        Encoder::new(Arc::new(Context::new(&params).unwrap()))
    }

    #[test]
    fn test_encode_then_decode() {
        let encoder = encoder(8);
        let v = gen_random_complex_vector(8);
        let plaintext = encoder.encode(&v, 1, encoder.default_scale()).unwrap();
        assert_eq!(plaintext.num_slots(), 8);
        assert_eq!(plaintext.level(), 1);
        let decoded = encoder.decode(&plaintext);
        assert_eq!(decoded.len(), 8);
        assert!(equal_up_to_epsilon(&v, &decoded, 1e-9));
    }

    #[test]
    fn test_encode_pads_with_zeros() {
        let encoder = encoder(6);
        assert_eq!(encoder.slots(), 8);
        let plaintext = encoder.encode_real(&[1.5, -2.0, 3.25], 0, encoder.default_scale()).unwrap();
        let decoded = encoder.decode(&plaintext);
        let expected: Vec<_> = [1.5, -2.0, 3.25, 0.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|x| Complex64::new(*x, 0.0))
            .collect();
        assert!(equal_up_to_epsilon(&expected, &decoded, 1e-9));
    }

    #[test]
    fn test_encode_full_slots() {
        let encoder = encoder(512);
        let v = gen_random_complex_vector(512);
        let plaintext = encoder.encode(&v, 1, encoder.default_scale()).unwrap();
        assert!(equal_up_to_epsilon(&v, &encoder.decode(&plaintext), 1e-8));
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        let encoder = encoder(4);
        let v = gen_random_complex_vector(5);
        assert!(matches!(
            encoder.encode(&v, 1, encoder.default_scale()),
            Err(CkksError::InvalidInput(_))
        ));
        assert!(matches!(
            encoder.encode(&v[..4], 2, encoder.default_scale()),
            Err(CkksError::InvalidInput(_))
        ));
        assert!(matches!(
            encoder.encode_real(&[f64::NAN], 1, encoder.default_scale()),
            Err(CkksError::InvalidInput(_))
        ));
        // 2^30 * 2^40 does not fit q_0 alone
        assert!(matches!(
            encoder.encode_real(&[(1u64 << 30) as f64], 0, encoder.default_scale()),
            Err(CkksError::InvalidInput(_))
        ));
    }
}
