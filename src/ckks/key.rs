use std::{collections::HashMap, fmt, sync::Arc};

use rand::Rng;
use tracing::debug;

use super::{
    context::Context,
    error::{CkksError, Result},
    plaintext::{Ciphertext, Plaintext},
    sampling::{sample_gaussian, sample_ternary, sample_uniform, sample_zo},
};
use crate::math::finite_field::{add_mod, mul_mod};

/// Ternary secret s, kept both as signed coefficients and in NTT form over
/// every chain and special modulus. Neither `Clone` nor printable.
pub struct SecretKey {
    coeffs: Vec<i64>,
    pub(crate) sx: Vec<u64>,
}

impl SecretKey {
    fn new<R: Rng>(rng: &mut R, context: &Context) -> Self {
        let coeffs = sample_ternary(rng, context.ring_dimension());
        let sx = context.from_signed(
            &coeffs,
            context.max_level() + 1,
            context.num_special_modulus(),
        );
        Self { coeffs, sx }
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// (b, a) = (-a * s + e, a) over the whole chain q_0..q_L.
#[derive(Debug, Clone)]
pub struct PublicKey {
    pub(crate) bx: Vec<u64>,
    pub(crate) ax: Vec<u64>,
}

/// Key switching key from s' to s, one pair per chain modulus q_i:
/// b_i + a_i * s = e_i + [i == j] * P * s' modulo q_j, and = e_i modulo P.
#[derive(Debug, Clone)]
pub struct SwitchingKey {
    pub(crate) bx: Vec<Vec<u64>>,
    pub(crate) ax: Vec<Vec<u64>>,
}

impl SwitchingKey {
    /// `s_prime` is in NTT form over the full basis.
    fn new<R: Rng>(rng: &mut R, context: &Context, sk: &SecretKey, s_prime: &[u64]) -> Self {
        let n = context.ring_dimension();
        let l = context.max_level() + 1;
        let k = context.num_special_modulus();

        let mut bx = Vec::with_capacity(l);
        let mut ax = Vec::with_capacity(l);
        for i in 0..l {
            let a = sample_uniform(rng, context, l, k);
            let e = context.from_signed(&sample_gaussian(rng, n, context.params().sigma()), l, k);

            // b = e - a * s
            let mut b = e;
            context.sub_inplace(&mut b, &context.mul(&a, &sk.sx, l, k), l, k);

            // + P * s' modulo q_i only
            let q = context.q_vec[i];
            let p_mod_q = context.p_mod_q[i];
            for (x, s) in b[i * n..(i + 1) * n]
                .iter_mut()
                .zip(s_prime[i * n..(i + 1) * n].iter())
            {
                *x = add_mod(*x, mul_mod(p_mod_q, *s, q), q);
            }

            bx.push(b);
            ax.push(a);
        }
        Self { bx, ax }
    }
}

/// Keys the evaluator needs: relinearization and left rotations by shift.
#[derive(Debug, Clone, Default)]
pub struct EvaluationKeys {
    pub(crate) relinearization: Option<SwitchingKey>,
    pub(crate) rotation: HashMap<usize, SwitchingKey>,
}

impl EvaluationKeys {
    pub fn has_relinearization_key(&self) -> bool {
        self.relinearization.is_some()
    }

    pub fn has_rotation_key(&self, shift: usize) -> bool {
        self.rotation.contains_key(&shift)
    }

    pub(crate) fn relinearization_key(&self) -> Result<&SwitchingKey> {
        self.relinearization
            .as_ref()
            .ok_or(CkksError::MissingRelinearizationKey)
    }

    pub(crate) fn rotation_key(&self, shift: usize) -> Result<&SwitchingKey> {
        self.rotation
            .get(&shift)
            .ok_or(CkksError::MissingRotationKey(shift))
    }
}

#[derive(Debug)]
struct KeyPair {
    public_key: PublicKey,
    secret_key: SecretKey,
}

/// Owns the key pair and derives evaluation keys from it.
///
/// The secret key never leaves this struct: decryption happens here.
pub struct KeyManager {
    context: Arc<Context>,
    key_pair: KeyPair,
    eval_keys: Arc<EvaluationKeys>,
}

impl KeyManager {
    /// Generates a fresh key pair. Evaluation keys are added separately.
    pub fn new(context: Arc<Context>) -> Self {
        let mut rng = rand::thread_rng();
        let secret_key = SecretKey::new(&mut rng, &context);

        let l = context.max_level() + 1;
        let n = context.ring_dimension();
        let ax = sample_uniform(&mut rng, &context, l, 0);
        // bx = ex - ax * sx
        let mut bx = context.from_signed(&sample_gaussian(&mut rng, n, context.params().sigma()), l, 0);
        context.sub_inplace(&mut bx, &context.mul(&ax, &secret_key.sx, l, 0), l, 0);
        debug!(n, levels = l, "generated key pair");

        Self {
            context,
            key_pair: KeyPair {
                public_key: PublicKey { bx, ax },
                secret_key,
            },
            eval_keys: Arc::new(EvaluationKeys::default()),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.key_pair.public_key
    }

    pub fn evaluation_keys(&self) -> Arc<EvaluationKeys> {
        Arc::clone(&self.eval_keys)
    }

    /// Key switching from s^2 to s.
    pub fn add_relinearization_key(&mut self) {
        let context = &self.context;
        let sk = &self.key_pair.secret_key;
        let full = context.max_level() + 1;
        let s_square = context.mul(&sk.sx, &sk.sx, full, context.num_special_modulus());

        let key = SwitchingKey::new(&mut rand::thread_rng(), context, sk, &s_square);
        Arc::make_mut(&mut self.eval_keys).relinearization = Some(key);
        debug!("generated relinearization key");
    }

    /// Key switching from s(X^{5^shift}) to s, realising a left rotation by
    /// `shift` slots.
    pub fn add_rotation_key(&mut self, shift: usize) {
        if self.eval_keys.has_rotation_key(shift) {
            return;
        }
        let context = &self.context;
        let sk = &self.key_pair.secret_key;
        let g = context.fft.rotation_exponent(shift);
        let s_rot = context.from_signed(
            &context.automorphism_signed(&sk.coeffs, g),
            context.max_level() + 1,
            context.num_special_modulus(),
        );

        let key = SwitchingKey::new(&mut rand::thread_rng(), context, sk, &s_rot);
        Arc::make_mut(&mut self.eval_keys).rotation.insert(shift, key);
        debug!(shift, "generated rotation key");
    }

    /// add left rotation keys for rot = 1, 2, 2^2, ..., below slots
    pub fn add_rotation_keys(&mut self, slots: usize) {
        let mut i = 1;
        while i < slots {
            self.add_rotation_key(i);
            i *= 2;
        }
    }

    /// Public key encryption at the plaintext's level:
    /// (c0, c1) = (v * b + e0 + m, v * a + e1).
    pub fn encrypt(&self, plaintext: &Plaintext) -> Ciphertext {
        let context = &self.context;
        let pk = &self.key_pair.public_key;
        let n = context.ring_dimension();
        let l = plaintext.level + 1;
        let sigma = context.params().sigma();
        let mut rng = rand::thread_rng();

        let vx = context.from_signed(&sample_zo(&mut rng, n), l, 0);

        let mut c0 = context.mul(&vx, &pk.bx, l, 0);
        context.add_inplace(&mut c0, &context.from_signed(&sample_gaussian(&mut rng, n, sigma), l, 0), l, 0);
        context.add_inplace(&mut c0, &plaintext.msg, l, 0);

        let mut c1 = context.mul(&vx, &pk.ax, l, 0);
        context.add_inplace(&mut c1, &context.from_signed(&sample_gaussian(&mut rng, n, sigma), l, 0), l, 0);

        Ciphertext {
            c0,
            c1,
            n,
            slots: plaintext.slots,
            level: plaintext.level,
            scale: plaintext.scale,
        }
    }

    /// m = c0 + c1 * s
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<Plaintext> {
        check_ciphertext(&self.context, ciphertext)?;
        let context = &self.context;
        let l = ciphertext.num_moduli();
        let mut msg = context.mul(&ciphertext.c1, &self.key_pair.secret_key.sx, l, 0);
        context.add_inplace(&mut msg, &ciphertext.c0, l, 0);
        Ok(Plaintext {
            msg,
            slots: ciphertext.slots,
            level: ciphertext.level,
            scale: ciphertext.scale,
        })
    }
}

/// Rejects ciphertexts that were not produced under this context.
pub(crate) fn check_ciphertext(context: &Context, ct: &Ciphertext) -> Result<()> {
    let expected = (ct.level + 1) * context.ring_dimension();
    if ct.n != context.ring_dimension()
        || ct.level > context.max_level()
        || !ct.slots.is_power_of_two()
        || ct.slots > context.ring_dimension() / 2
        || ct.c0.len() != expected
        || ct.c1.len() != expected
    {
        return Err(CkksError::InvalidInput(
            "ciphertext does not belong to this context".to_string(),
        ));
    }
    Ok(())
}
