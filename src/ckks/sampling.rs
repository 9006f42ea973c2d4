//! Secret, ephemeral and error distributions.
//!
//! Gaussian errors are continuous samples rounded to the nearest integer,
//! which is not constant time.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::context::Context;

/// Rounded Gaussian with standard deviation sigma.
pub(crate) fn sample_gaussian<R: Rng>(rng: &mut R, n: usize, sigma: f64) -> Vec<i64> {
    let normal = Normal::new(0.0, sigma).expect("sigma is validated by the parameter builder");
    (0..n).map(|_| normal.sample(rng).round() as i64).collect()
}

/// Uniform over {-1, 0, 1}.
pub(crate) fn sample_ternary<R: Rng>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n).map(|_| rng.gen_range(-1..=1)).collect()
}

/// Zero with probability 1/2, otherwise +1 or -1 with equal probability.
pub(crate) fn sample_zo<R: Rng>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n)
        .map(|_| match rng.gen_range(0..4) {
            0 => 1,
            1 => -1,
            _ => 0,
        })
        .collect()
}

/// Uniform element over `l` chain moduli and `k` special moduli. Sampled
/// directly in NTT form, where it is just as uniform.
pub(crate) fn sample_uniform<R: Rng>(rng: &mut R, context: &Context, l: usize, k: usize) -> Vec<u64> {
    let n = context.ring_dimension();
    let mut res = Vec::with_capacity((l + k) * n);
    for q in context.q_vec[..l].iter().chain(context.p_vec[..k].iter()) {
        res.extend((0..n).map(|_| rng.gen_range(0..*q)));
    }
    res
}
