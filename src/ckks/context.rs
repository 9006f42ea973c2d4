use tracing::debug;

use super::{
    approx_modulus_switch::{fast_basis_conversion, CrtBasis},
    error::{CkksError, Result},
    params::{SchemeParameters, FIRST_MOD_BITS, SPECIAL_MOD_BITS},
};
use crate::math::{
    fft::SpecialFft,
    finite_field::{
        add_mod, inv_mod, mul_mod, neg_mod, reduce_centered, reduce_i128, sub_mod,
    },
    ntt::NttTable,
    prime::{is_prime, prime_below},
};

/// Number of special primes making up P. One 61-bit prime already exceeds
/// every digit of the per-prime decomposition.
const NUM_SPECIAL_MODULUS: usize = 1;

/// The RNS ring Z_Q[X]/(X^N + 1) with Q = q_0 * ... * q_L, extended by the
/// special modulus P for key switching.
///
/// A ring element over `l` chain moduli and `k` special moduli is a flat
/// vector of `(l + k) * N` residues: the residues modulo q_0, ..., q_{l-1}
/// followed by those modulo p_0, ..., p_{k-1}. Unless a method says
/// otherwise, elements are kept in NTT form.
pub struct Context {
    params: SchemeParameters,
    pub(crate) n: usize,
    /// L, the number of rescalings the chain supports
    pub(crate) max_level: usize,
    /// q_0, q_1, ..., q_L
    pub(crate) q_vec: Vec<u64>,
    /// p_0, ..., p_{k-1}
    pub(crate) p_vec: Vec<u64>,
    /// NTT tables for q_0..q_L followed by p_0..p_{k-1}
    tables: Vec<NttTable>,
    pub(crate) fft: SpecialFft,
    /// q_l^{-1} mod q_j for j < l, indexed [l][j]
    rescale_inv: Vec<Vec<u64>>,
    /// CRT data for q_0..q_l, indexed by level l
    crt_bases: Vec<CrtBasis>,
    /// scale a ciphertext carries at each level when every multiplication
    /// rescales fresh-scaled operands: s_L = 2^scale_bits, s_{l-1} = s_l^2 / q_l
    level_scales: Vec<f64>,
    /// P mod q_j
    pub(crate) p_mod_q: Vec<u64>,
    /// P^{-1} mod q_j
    p_inv_mod_q: Vec<u64>,
    /// (P / p_i)^{-1} mod p_i
    p_hat_inv_mod_p: Vec<u64>,
    /// (P / p_i) mod q_j, indexed [i][j]
    p_hat_mod_q: Vec<Vec<u64>>,
}

impl Context {
    pub fn new(params: &SchemeParameters) -> Result<Self> {
        let n = params.ring_dimension();
        let max_level = params.mult_depth();
        let (q_vec, p_vec) = generate_primes(n, max_level, params.scale_factor_bits())?;
        debug!(n, ?q_vec, ?p_vec, "generated modulus chain");

        let tables = q_vec
            .iter()
            .chain(p_vec.iter())
            .map(|q| NttTable::new(*q, n))
            .collect();

        let rescale_inv = (0..=max_level)
            .map(|l| (0..l).map(|j| inv_mod(q_vec[l] % q_vec[j], q_vec[j])).collect())
            .collect();

        let crt_bases = (1..=max_level + 1)
            .map(|l| CrtBasis::new(&q_vec[..l]))
            .collect();

        let mut level_scales = vec![params.scale(); max_level + 1];
        for l in (1..=max_level).rev() {
            level_scales[l - 1] = level_scales[l] * level_scales[l] / q_vec[l] as f64;
        }

        let p_mod_q: Vec<u64> = q_vec
            .iter()
            .map(|q| p_vec.iter().fold(1, |acc, p| mul_mod(acc, p % q, *q)))
            .collect();
        let p_inv_mod_q = q_vec
            .iter()
            .zip(p_mod_q.iter())
            .map(|(q, p)| inv_mod(*p, *q))
            .collect();

        let p_hat_inv_mod_p = (0..p_vec.len())
            .map(|i| {
                let hat = product_mod_except(&p_vec, i, p_vec[i]);
                inv_mod(hat, p_vec[i])
            })
            .collect();
        let p_hat_mod_q = (0..p_vec.len())
            .map(|i| {
                q_vec
                    .iter()
                    .map(|q| product_mod_except(&p_vec, i, *q))
                    .collect()
            })
            .collect();

        Ok(Self {
            params: params.clone(),
            n,
            max_level,
            q_vec,
            p_vec,
            tables,
            fft: SpecialFft::new(n),
            rescale_inv,
            crt_bases,
            level_scales,
            p_mod_q,
            p_inv_mod_q,
            p_hat_inv_mod_p,
            p_hat_mod_q,
        })
    }

    pub fn params(&self) -> &SchemeParameters {
        &self.params
    }

    pub fn ring_dimension(&self) -> usize {
        self.n
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// The modulus chain q_0, ..., q_L.
    pub fn moduli(&self) -> &[u64] {
        &self.q_vec
    }

    /// The scale products of fresh ciphertexts carry at `level`.
    pub fn scale_at(&self, level: usize) -> f64 {
        self.level_scales[level]
    }

    pub(crate) fn num_special_modulus(&self) -> usize {
        self.p_vec.len()
    }

    /// Tables of the first `l` chain moduli followed by the first `k` special ones.
    fn tables(&self, l: usize, k: usize) -> impl Iterator<Item = &NttTable> {
        let special = self.max_level + 1;
        self.tables[..l]
            .iter()
            .chain(self.tables[special..special + k].iter())
    }

    /// Index of the residue at position `pos` of an element over `l` chain
    /// moduli inside an element over the full basis q_0..q_L, p_0..p_{k-1}.
    fn full_index(&self, pos: usize, l: usize) -> usize {
        if pos < l {
            pos
        } else {
            self.max_level + 1 + (pos - l)
        }
    }

    fn zip_residues<F>(&self, a: &mut [u64], b: &[u64], l: usize, k: usize, f: F)
    where
        F: Fn(u64, u64, u64) -> u64,
    {
        let n = self.n;
        debug_assert!(a.len() >= (l + k) * n && b.len() >= (l + k) * n);
        for (pos, table) in self.tables(l, k).enumerate() {
            let q = table.modulus();
            let range = pos * n..(pos + 1) * n;
            for (x, y) in a[range.clone()].iter_mut().zip(b[range].iter()) {
                *x = f(*x, *y, q);
            }
        }
    }

    pub(crate) fn add_inplace(&self, a: &mut [u64], b: &[u64], l: usize, k: usize) {
        self.zip_residues(a, b, l, k, add_mod);
    }

    pub(crate) fn add(&self, a: &[u64], b: &[u64], l: usize, k: usize) -> Vec<u64> {
        let mut res = a[..(l + k) * self.n].to_vec();
        self.add_inplace(&mut res, b, l, k);
        res
    }

    pub(crate) fn sub_inplace(&self, a: &mut [u64], b: &[u64], l: usize, k: usize) {
        self.zip_residues(a, b, l, k, sub_mod);
    }

    pub(crate) fn sub(&self, a: &[u64], b: &[u64], l: usize, k: usize) -> Vec<u64> {
        let mut res = a[..(l + k) * self.n].to_vec();
        self.sub_inplace(&mut res, b, l, k);
        res
    }

    pub(crate) fn mul_inplace(&self, a: &mut [u64], b: &[u64], l: usize, k: usize) {
        self.zip_residues(a, b, l, k, mul_mod);
    }

    pub(crate) fn mul(&self, a: &[u64], b: &[u64], l: usize, k: usize) -> Vec<u64> {
        let mut res = a[..(l + k) * self.n].to_vec();
        self.mul_inplace(&mut res, b, l, k);
        res
    }

    pub(crate) fn negate(&self, a: &[u64], l: usize, k: usize) -> Vec<u64> {
        let n = self.n;
        let mut res = a[..(l + k) * n].to_vec();
        for (pos, table) in self.tables(l, k).enumerate() {
            let q = table.modulus();
            for x in res[pos * n..(pos + 1) * n].iter_mut() {
                *x = neg_mod(*x, q);
            }
        }
        res
    }

    /// acc += a * key, where `a` and `acc` live over `l` chain moduli plus the
    /// special moduli and `key` over the full basis.
    pub(crate) fn mul_key_add_inplace(&self, acc: &mut [u64], a: &[u64], key: &[u64], l: usize) {
        let n = self.n;
        let k = self.num_special_modulus();
        for (pos, table) in self.tables(l, k).enumerate() {
            let q = table.modulus();
            let offset = self.full_index(pos, l) * n;
            let key = &key[offset..offset + n];
            let range = pos * n..(pos + 1) * n;
            for ((x, y), z) in acc[range.clone()]
                .iter_mut()
                .zip(a[range].iter())
                .zip(key.iter())
            {
                *x = add_mod(*x, mul_mod(*y, *z, q), q);
            }
        }
    }

    /// Adds the constant polynomial c to an element over `l` chain moduli.
    /// The NTT of a constant is the constant in every slot.
    pub(crate) fn add_const_inplace(&self, a: &mut [u64], c: i128, l: usize) {
        let n = self.n;
        for (pos, table) in self.tables(l, 0).enumerate() {
            let q = table.modulus();
            let c = reduce_i128(c, q);
            for x in a[pos * n..(pos + 1) * n].iter_mut() {
                *x = add_mod(*x, c, q);
            }
        }
    }

    /// Multiplies an element over `l` chain moduli by the integer c.
    pub(crate) fn mul_scalar_inplace(&self, a: &mut [u64], c: u64, l: usize) {
        let n = self.n;
        for (pos, table) in self.tables(l, 0).enumerate() {
            let q = table.modulus();
            let c = c % q;
            for x in a[pos * n..(pos + 1) * n].iter_mut() {
                *x = mul_mod(*x, c, q);
            }
        }
    }

    pub(crate) fn ntt(&self, a: &mut [u64], l: usize, k: usize) {
        let n = self.n;
        for (pos, table) in self.tables(l, k).enumerate() {
            table.forward(&mut a[pos * n..(pos + 1) * n]);
        }
    }

    pub(crate) fn intt(&self, a: &mut [u64], l: usize, k: usize) {
        let n = self.n;
        for (pos, table) in self.tables(l, k).enumerate() {
            table.backward(&mut a[pos * n..(pos + 1) * n]);
        }
    }

    /// Reduces signed coefficients into every modulus and moves to NTT form.
    pub(crate) fn from_signed<T>(&self, coeffs: &[T], l: usize, k: usize) -> Vec<u64>
    where
        T: Into<i128> + Copy,
    {
        debug_assert_eq!(coeffs.len(), self.n);
        let mut res = Vec::with_capacity((l + k) * self.n);
        for table in self.tables(l, k) {
            let q = table.modulus();
            res.extend(coeffs.iter().map(|c| reduce_i128((*c).into(), q)));
        }
        self.ntt(&mut res, l, k);
        res
    }

    /// X -> X^g on an element in NTT form. g must be odd.
    pub(crate) fn automorphism(&self, a: &[u64], l: usize, k: usize, g: usize) -> Vec<u64> {
        let n = self.n;
        let mut coeffs = a[..(l + k) * n].to_vec();
        self.intt(&mut coeffs, l, k);

        let mut res = vec![0u64; (l + k) * n];
        for (pos, table) in self.tables(l, k).enumerate() {
            let q = table.modulus();
            let src = &coeffs[pos * n..(pos + 1) * n];
            let dst = &mut res[pos * n..(pos + 1) * n];
            for (i, x) in src.iter().enumerate() {
                let shift = (i * g) % (2 * n);
                if shift < n {
                    dst[shift] = *x;
                } else {
                    dst[shift - n] = neg_mod(*x, q);
                }
            }
        }
        self.ntt(&mut res, l, k);
        res
    }

    /// X -> X^g on signed coefficients.
    pub(crate) fn automorphism_signed(&self, coeffs: &[i64], g: usize) -> Vec<i64> {
        let n = self.n;
        let mut res = vec![0i64; n];
        for (i, x) in coeffs.iter().enumerate() {
            let shift = (i * g) % (2 * n);
            if shift < n {
                res[shift] = *x;
            } else {
                res[shift - n] = -*x;
            }
        }
        res
    }

    /// Lifts a residue polynomial modulo q_i, given in coefficient form, to
    /// an element over `l` chain moduli and `k` special moduli in NTT form,
    /// using the centered representative.
    pub(crate) fn lift_residue(&self, digit: &[u64], i: usize, l: usize, k: usize) -> Vec<u64> {
        let from = self.q_vec[i];
        let mut res = Vec::with_capacity((l + k) * self.n);
        for table in self.tables(l, k) {
            let to = table.modulus();
            res.extend(digit.iter().map(|x| reduce_centered(*x, from, to)));
        }
        self.ntt(&mut res, l, k);
        res
    }

    /// Divides by q_{l-1} with rounding and drops it: an element over `l`
    /// chain moduli becomes one over `l - 1`.
    pub(crate) fn rescale(&self, a: &[u64], l: usize) -> Vec<u64> {
        debug_assert!(l >= 2);
        let n = self.n;
        let last = l - 1;
        let q_last = self.q_vec[last];

        let mut r = a[last * n..l * n].to_vec();
        self.tables[last].backward(&mut r);

        let mut res = a[..last * n].to_vec();
        let mut tmp = vec![0u64; n];
        for j in 0..last {
            let q = self.q_vec[j];
            for (t, x) in tmp.iter_mut().zip(r.iter()) {
                *t = reduce_centered(*x, q_last, q);
            }
            self.tables[j].forward(&mut tmp);
            let inv = self.rescale_inv[last][j];
            for (x, t) in res[j * n..(j + 1) * n].iter_mut().zip(tmp.iter()) {
                *x = mul_mod(sub_mod(*x, *t, q), inv, q);
            }
        }
        res
    }

    /// Approximately divides by P: an element over `l` chain moduli plus the
    /// special moduli becomes one over the `l` chain moduli.
    pub(crate) fn mod_down(&self, a: &[u64], l: usize) -> Vec<u64> {
        let n = self.n;
        let k = self.num_special_modulus();
        let mut special = a[l * n..(l + k) * n].to_vec();
        for (pos, table) in self.tables(0, k).enumerate() {
            table.backward(&mut special[pos * n..(pos + 1) * n]);
        }

        let mut conv = fast_basis_conversion(
            &special,
            &self.p_vec,
            &self.q_vec[..l],
            n,
            &self.p_hat_inv_mod_p,
            &self.p_hat_mod_q,
        );
        self.ntt(&mut conv, l, 0);

        let mut res = a[..l * n].to_vec();
        for j in 0..l {
            let q = self.q_vec[j];
            let inv = self.p_inv_mod_q[j];
            for (x, c) in res[j * n..(j + 1) * n]
                .iter_mut()
                .zip(conv[j * n..(j + 1) * n].iter())
            {
                *x = mul_mod(sub_mod(*x, *c, q), inv, q);
            }
        }
        res
    }

    /// Signed coefficients of an element over `l` chain moduli, reconstructed
    /// by CRT into (-Q_l/2, Q_l/2].
    pub(crate) fn to_signed_coeffs(&self, a: &[u64], l: usize) -> Vec<f64> {
        let n = self.n;
        let mut coeffs = a[..l * n].to_vec();
        self.intt(&mut coeffs, l, 0);

        if l == 1 {
            let q = self.q_vec[0];
            return coeffs
                .iter()
                .map(|x| {
                    if *x > q / 2 {
                        -((q - x) as f64)
                    } else {
                        *x as f64
                    }
                })
                .collect();
        }

        let crt = &self.crt_bases[l - 1];
        let mut remainders = vec![0u64; l];
        (0..n)
            .map(|i| {
                for (j, r) in remainders.iter_mut().enumerate() {
                    *r = coeffs[j * n + i];
                }
                crt.reconstruct_centered(&remainders)
            })
            .collect()
    }
}

/// prod_{j != i} p_j mod q
fn product_mod_except(p_vec: &[u64], i: usize, q: u64) -> u64 {
    p_vec
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .fold(1 % q, |acc, (_, p)| mul_mod(acc, p % q, q))
}

/// Chooses q_0 just below 2^FIRST_MOD_BITS, L scaling primes alternating
/// around 2^scale_bits so that their product stays close to the scale
/// squared, and the special primes just below 2^SPECIAL_MOD_BITS. Every prime
/// is congruent to 1 modulo 2N.
fn generate_primes(n: usize, max_level: usize, scale_bits: u32) -> Result<(Vec<u64>, Vec<u64>)> {
    let m = 2 * n as u64;
    let no_prime = |what: &str| {
        CkksError::InvalidParameters(format!(
            "not enough NTT-friendly primes for {} with ring dimension {}",
            what, n
        ))
    };

    let mut q_vec = Vec::with_capacity(max_level + 1);
    q_vec.push(prime_below(1 << FIRST_MOD_BITS, m, &[]).ok_or_else(|| no_prime("q_0"))?);

    let p = 1u64 << scale_bits;
    let mut bnd = 1u64;
    while q_vec.len() < max_level + 1 {
        let offset = bnd.checked_mul(m).filter(|o| *o < p).ok_or_else(|| no_prime("the scaling primes"))?;
        let p1 = p + offset + 1;
        if is_prime(p1) && !q_vec.contains(&p1) {
            q_vec.push(p1);
        }
        if q_vec.len() == max_level + 1 {
            break;
        }
        let p2 = p - offset + 1;
        if is_prime(p2) && !q_vec.contains(&p2) {
            q_vec.push(p2);
        }
        bnd += 1;
    }

    let mut p_vec = Vec::with_capacity(NUM_SPECIAL_MODULUS);
    let mut upper = 1u64 << SPECIAL_MOD_BITS;
    while p_vec.len() < NUM_SPECIAL_MODULUS {
        let special = prime_below(upper, m, &q_vec).ok_or_else(|| no_prime("the special modulus"))?;
        p_vec.push(special);
        upper = special;
    }

    Ok((q_vec, p_vec))
}
