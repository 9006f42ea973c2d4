use num_bigint::BigUint;

use crate::math::finite_field::{inv_mod, mul_mod};

/// C = {q_0, \ldots, q_{l-1}}, B = {p_0, \ldots, p_{k-1}}
/// Conv_{C->B}([a]_C) = [a + Q * e]_B, the input and output are of
/// coefficient form.
pub(crate) fn fast_basis_conversion(
    a: &[u64],
    basis_c: &[u64],
    basis_b: &[u64],
    ring_dim: usize,
    c_hat_inv_mod_c: &[u64],
    c_hat_mod_b: &[Vec<u64>],
) -> Vec<u64> {
    debug_assert_eq!(a.len(), basis_c.len() * ring_dim);

    let tmp: Vec<u128> = basis_c
        .iter()
        .enumerate()
        .flat_map(|(i, ci)| {
            a[i * ring_dim..(i + 1) * ring_dim]
                .iter()
                .map(move |x| mul_mod(*x, c_hat_inv_mod_c[i], *ci) as u128)
        })
        .collect();

    let mut res = Vec::with_capacity(basis_b.len() * ring_dim);
    for (k, bk) in basis_b.iter().enumerate() {
        res.extend((0..ring_dim).map(|n| {
            let sum: u128 = (0..basis_c.len())
                .map(|i| tmp[n + i * ring_dim] * c_hat_mod_b[i][k] as u128)
                .sum();
            (sum % *bk as u128) as u64
        }));
    }
    res
}

/// Precomputed CRT data for reconstructing integers modulo q_0 * ... * q_{l-1}.
pub(crate) struct CrtBasis {
    basis: Vec<u64>,
    modulus: BigUint,
    half_modulus: BigUint,
    /// Q / q_i
    q_hat: Vec<BigUint>,
    /// (Q / q_i)^{-1} mod q_i
    q_hat_inv: Vec<u64>,
}

impl CrtBasis {
    pub(crate) fn new(basis: &[u64]) -> Self {
        let modulus: BigUint = basis.iter().map(|q| BigUint::from(*q)).product();
        let q_hat: Vec<BigUint> = basis.iter().map(|q| &modulus / *q).collect();
        let q_hat_inv = basis
            .iter()
            .zip(q_hat.iter())
            .map(|(q, hat)| {
                let hat_mod_q = (hat % *q).to_u64_digits().first().copied().unwrap_or(0);
                inv_mod(hat_mod_q, *q)
            })
            .collect();
        Self {
            basis: basis.to_vec(),
            half_modulus: &modulus >> 1,
            modulus,
            q_hat,
            q_hat_inv,
        }
    }

    pub(crate) fn reconstruct(&self, remainders: &[u64]) -> BigUint {
        let sum: BigUint = remainders
            .iter()
            .zip(self.basis.iter())
            .enumerate()
            .map(|(i, (a, q))| BigUint::from(mul_mod(*a, self.q_hat_inv[i], *q)) * &self.q_hat[i])
            .sum();
        sum % &self.modulus
    }

    /// Reconstructs the value in the centered range (-Q/2, Q/2] as a float.
    pub(crate) fn reconstruct_centered(&self, remainders: &[u64]) -> f64 {
        let x = self.reconstruct(remainders);
        if x > self.half_modulus {
            -biguint_to_f64(&(&self.modulus - x))
        } else {
            biguint_to_f64(&x)
        }
    }
}

fn biguint_to_f64(x: &BigUint) -> f64 {
    x.to_u64_digits()
        .iter()
        .rev()
        .fold(0.0, |acc, d| acc * 18446744073709551616.0 + *d as f64)
}
