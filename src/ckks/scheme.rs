use std::sync::Arc;

use num_complex::Complex64;
use tracing::trace;

use super::{
    context::Context,
    encoder::{coefficient_bound, scale_up, Encoder},
    error::{CkksError, Result},
    key::{check_ciphertext, EvaluationKeys, SwitchingKey},
    plaintext::{Ciphertext, Plaintext},
};

/// Relative difference under which two scales count as equal.
const SCALE_TOLERANCE: f64 = 1e-5;

/// Upper bound on the integer factor `mod_down_to` multiplies by.
const MAX_REALIGN_FACTOR: f64 = (1u64 << 62) as f64;

/// Homomorphic operators. Holds only public material, every method takes
/// `&self` and returns a fresh ciphertext.
#[derive(Clone)]
pub struct Evaluator {
    context: Arc<Context>,
    encoder: Encoder,
    keys: Arc<EvaluationKeys>,
}

impl Evaluator {
    pub fn new(context: Arc<Context>, keys: Arc<EvaluationKeys>) -> Self {
        let encoder = Encoder::new(Arc::clone(&context));
        Self {
            context,
            encoder,
            keys,
        }
    }

    pub fn add(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<Ciphertext> {
        self.check_additive(ct1, ct2)?;
        trace!(level = ct1.level, "add");
        let l = ct1.num_moduli();
        Ok(Ciphertext {
            c0: self.context.add(&ct1.c0, &ct2.c0, l, 0),
            c1: self.context.add(&ct1.c1, &ct2.c1, l, 0),
            ..ct1.clone_metadata()
        })
    }

    pub fn sub(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<Ciphertext> {
        self.check_additive(ct1, ct2)?;
        trace!(level = ct1.level, "sub");
        let l = ct1.num_moduli();
        Ok(Ciphertext {
            c0: self.context.sub(&ct1.c0, &ct2.c0, l, 0),
            c1: self.context.sub(&ct1.c1, &ct2.c1, l, 0),
            ..ct1.clone_metadata()
        })
    }

    pub fn negate(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        let l = ct.num_moduli();
        Ok(Ciphertext {
            c0: self.context.negate(&ct.c0, l, 0),
            c1: self.context.negate(&ct.c1, l, 0),
            ..ct.clone_metadata()
        })
    }

    /// Adds `constant` to every slot. Level and scale are unchanged.
    pub fn add_const(&self, ct: &Ciphertext, constant: f64) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        let scaled = scale_up(constant, ct.scale, coefficient_bound(&self.context, ct.level))?;
        let mut res = ct.clone();
        self.context
            .add_const_inplace(&mut res.c0, scaled, ct.num_moduli());
        Ok(res)
    }

    /// Tensor product, relinearization and rescale. The result is one level
    /// lower with scale `scale1 * scale2 / q_level`.
    pub fn mul(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct1)?;
        check_ciphertext(&self.context, ct2)?;
        if ct1.level == 0 || ct2.level == 0 {
            return Err(CkksError::DepthExhausted);
        }
        check_aligned(ct1.level, ct1.slots, ct2.level, ct2.slots)?;
        let relin_key = self.keys.relinearization_key()?;
        trace!(level = ct1.level, "mul");

        let context = &self.context;
        let l = ct1.num_moduli();
        let mut d0 = context.mul(&ct1.c0, &ct2.c0, l, 0);
        let mut d1 = context.mul(&ct1.c0, &ct2.c1, l, 0);
        context.add_inplace(&mut d1, &context.mul(&ct1.c1, &ct2.c0, l, 0), l, 0);
        let d2 = context.mul(&ct1.c1, &ct2.c1, l, 0);

        let (k0, k1) = self.key_switch(&d2, l, relin_key);
        context.add_inplace(&mut d0, &k0, l, 0);
        context.add_inplace(&mut d1, &k1, l, 0);

        Ok(self.rescale(d0, d1, ct1, ct1.scale * ct2.scale))
    }

    /// Ciphertext-plaintext product followed by a rescale. Needs no
    /// evaluation key.
    pub fn mul_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        if ct.level == 0 {
            return Err(CkksError::DepthExhausted);
        }
        check_aligned(ct.level, ct.slots, pt.level, pt.slots)?;
        trace!(level = ct.level, "mul_plain");

        let l = ct.num_moduli();
        let c0 = self.context.mul(&ct.c0, &pt.msg, l, 0);
        let c1 = self.context.mul(&ct.c1, &pt.msg, l, 0);
        Ok(self.rescale(c0, c1, ct, ct.scale * pt.scale))
    }

    /// Slotwise product with `constants`, encoded at the ciphertext's level
    /// and scale. Missing constants are zero.
    pub fn mul_const(&self, ct: &Ciphertext, constants: &[f64]) -> Result<Ciphertext> {
        let constants: Vec<_> = constants.iter().map(|x| Complex64::new(*x, 0.0)).collect();
        self.mul_const_complex(ct, &constants)
    }

    pub fn mul_const_complex(&self, ct: &Ciphertext, constants: &[Complex64]) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        if ct.level == 0 {
            return Err(CkksError::DepthExhausted);
        }
        let pt = self.encoder.encode(constants, ct.level, ct.scale)?;
        self.mul_plain(ct, &pt)
    }

    /// Brings `ct` down to `level` with the scale a product carries there,
    /// so it can be added to one. When the scales already agree the primes
    /// above `level` are dropped. Otherwise the ciphertext is multiplied by
    /// an integer and rescaled by q_{level+1}.
    pub fn mod_down_to(&self, ct: &Ciphertext, level: usize) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        if level > ct.level {
            return Err(CkksError::InvalidInput(format!(
                "cannot raise a ciphertext from level {} to {}",
                ct.level, level
            )));
        }
        if level == ct.level {
            return Ok(ct.clone());
        }

        let target = self.context.scale_at(level);
        if (ct.scale - target).abs() <= SCALE_TOLERANCE * ct.scale.max(target) {
            return Ok(self.truncate(ct, level));
        }

        // Multiply by round(target * q_{level+1} / scale) and rescale by q_{level+1},
        // landing on the scale products carry at `level`.
        let q_next = self.context.moduli()[level + 1] as f64;
        let c = (target * q_next / ct.scale).round();
        if !(1.0..MAX_REALIGN_FACTOR).contains(&c) {
            return Ok(self.truncate(ct, level));
        }
        let c = c as u64;
        let mut upper = self.truncate(ct, level + 1);
        let l = upper.num_moduli();
        self.context.mul_scalar_inplace(&mut upper.c0, c, l);
        self.context.mul_scalar_inplace(&mut upper.c1, c, l);
        trace!(level, factor = c, "realigned scale");
        let c0 = std::mem::take(&mut upper.c0);
        let c1 = std::mem::take(&mut upper.c1);
        Ok(self.rescale(c0, c1, &upper, ct.scale * c as f64))
    }

    /// Left rotation by `shift` slots, right rotation for negative `shift`.
    /// Uses the key for the exact amount when there is one, otherwise the
    /// power-of-two keys of its binary expansion.
    pub fn rotate(&self, ct: &Ciphertext, shift: isize) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        let mut rot = shift.rem_euclid(ct.slots as isize) as usize;
        if rot == 0 {
            return Ok(ct.clone());
        }
        if let Ok(key) = self.keys.rotation_key(rot) {
            return Ok(self.rotate_with(ct, rot, key));
        }

        let mut res = ct.clone();
        let mut pow = 1;
        while rot > 0 {
            if rot & 1 == 1 {
                res = self.rotate_with(&res, pow, self.keys.rotation_key(pow)?);
            }
            rot >>= 1;
            pow <<= 1;
        }
        Ok(res)
    }

    /// Rotate-and-add over shifts 1, 2, ..., batch_size / 2. Slot i ends up
    /// holding the sum of slots i, ..., i + batch_size - 1.
    pub fn sum(&self, ct: &Ciphertext, batch_size: usize) -> Result<Ciphertext> {
        check_ciphertext(&self.context, ct)?;
        if !batch_size.is_power_of_two() || batch_size > ct.slots {
            return Err(CkksError::InvalidInput(format!(
                "batch size {} must be a power of two not above {} slots",
                batch_size, ct.slots
            )));
        }
        trace!(batch_size, "sum");

        let mut res = ct.clone();
        let mut shift = 1;
        while shift < batch_size {
            let rotated = self.rotate_with(&res, shift, self.keys.rotation_key(shift)?);
            res = self.add(&res, &rotated)?;
            shift <<= 1;
        }
        Ok(res)
    }

    /// (tau(c0) + k0, k1) where (k0, k1) switches tau(c1) from tau(s) to s.
    fn rotate_with(&self, ct: &Ciphertext, shift: usize, key: &SwitchingKey) -> Ciphertext {
        trace!(shift, level = ct.level, "rotate");
        let context = &self.context;
        let l = ct.num_moduli();
        let g = context.fft.rotation_exponent(shift);

        let mut c0 = context.automorphism(&ct.c0, l, 0, g);
        let c1 = context.automorphism(&ct.c1, l, 0, g);
        let (k0, k1) = self.key_switch(&c1, l, key);
        context.add_inplace(&mut c0, &k0, l, 0);

        Ciphertext {
            c0,
            c1: k1,
            ..ct.clone_metadata()
        }
    }

    /// Given d over `l` chain moduli, returns (k0, k1) with
    /// k0 + k1 * s \approx d * s' where `key` switches from s' to s.
    fn key_switch(&self, d: &[u64], l: usize, key: &SwitchingKey) -> (Vec<u64>, Vec<u64>) {
        let context = &self.context;
        let n = context.ring_dimension();
        let k = context.num_special_modulus();

        let mut digits = d[..l * n].to_vec();
        context.intt(&mut digits, l, 0);

        let mut acc0 = vec![0u64; (l + k) * n];
        let mut acc1 = vec![0u64; (l + k) * n];
        for i in 0..l {
            let lifted = context.lift_residue(&digits[i * n..(i + 1) * n], i, l, k);
            context.mul_key_add_inplace(&mut acc0, &lifted, &key.bx[i], l);
            context.mul_key_add_inplace(&mut acc1, &lifted, &key.ax[i], l);
        }
        (context.mod_down(&acc0, l), context.mod_down(&acc1, l))
    }

    fn truncate(&self, ct: &Ciphertext, level: usize) -> Ciphertext {
        let len = (level + 1) * self.context.ring_dimension();
        Ciphertext {
            c0: ct.c0[..len].to_vec(),
            c1: ct.c1[..len].to_vec(),
            level,
            ..ct.clone_metadata()
        }
    }

    fn rescale(&self, c0: Vec<u64>, c1: Vec<u64>, ct: &Ciphertext, scale: f64) -> Ciphertext {
        let l = ct.num_moduli();
        let q_last = self.context.moduli()[ct.level] as f64;
        Ciphertext {
            c0: self.context.rescale(&c0, l),
            c1: self.context.rescale(&c1, l),
            level: ct.level - 1,
            scale: scale / q_last,
            ..ct.clone_metadata()
        }
    }

    fn check_additive(&self, ct1: &Ciphertext, ct2: &Ciphertext) -> Result<()> {
        check_ciphertext(&self.context, ct1)?;
        check_ciphertext(&self.context, ct2)?;
        check_aligned(ct1.level, ct1.slots, ct2.level, ct2.slots)?;
        if (ct1.scale - ct2.scale).abs() > SCALE_TOLERANCE * ct1.scale.max(ct2.scale) {
            return Err(CkksError::ScaleMismatch {
                left: ct1.scale,
                right: ct2.scale,
            });
        }
        Ok(())
    }
}

fn check_aligned(left_level: usize, left_slots: usize, right_level: usize, right_slots: usize) -> Result<()> {
    if left_level != right_level {
        return Err(CkksError::LevelMismatch {
            left: left_level,
            right: right_level,
        });
    }
    if left_slots != right_slots {
        return Err(CkksError::SlotMismatch {
            left: left_slots,
            right: right_slots,
        });
    }
    Ok(())
}

impl Ciphertext {
    /// Same metadata, empty components. Only meant for struct update syntax.
    fn clone_metadata(&self) -> Ciphertext {
        Ciphertext {
            c0: Vec::new(),
            c1: Vec::new(),
            n: self.n,
            slots: self.slots,
            level: self.level,
            scale: self.scale,
        }
    }
}
