use num_complex::Complex64;
use std::f64::consts::PI;

use super::ntt::bitrev;

/// The "special" FFT of HEAAN: evaluates a slot vector at the roots
/// ksi^{5^j} of X^N + 1, which is the canonical embedding restricted to
/// one representative of each conjugate pair.
#[derive(Debug, Clone)]
pub(crate) struct SpecialFft {
    /// 2N
    m: usize,
    /// 5^j mod 2N, for j in [0, N/2)
    rot_group: Vec<usize>,
    /// ksi^i for i in [0, 2N], ksi = exp(2 pi i / 2N)
    ksi_pows: Vec<Complex64>,
}

impl SpecialFft {
    pub(crate) fn new(n: usize) -> Self {
        let m = 2 * n;
        let mut rot_group = Vec::with_capacity(n / 2);
        let mut five_pow = 1;
        for _ in 0..n / 2 {
            rot_group.push(five_pow);
            five_pow = (5 * five_pow) % m;
        }

        let mut ksi_pows: Vec<_> = (0..m)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / m as f64;
                Complex64::new(angle.cos(), angle.sin())
            })
            .collect();
        ksi_pows.push(ksi_pows[0]);

        Self {
            m,
            rot_group,
            ksi_pows,
        }
    }

    /// Galois element 5^r mod 2N that realises a left rotation by r slots.
    pub(crate) fn rotation_exponent(&self, r: usize) -> usize {
        self.rot_group[r % self.rot_group.len()]
    }

    /// Slot values to embedding coefficients, used while encoding.
    pub(crate) fn inverse(&self, x: &mut [Complex64]) {
        let n = x.len();
        let mut len = n;
        while len >= 1 {
            let lenq = len << 2;
            for i in 0..n / len {
                for j in 0..len / 2 {
                    let idx = (lenq - (self.rot_group[j] % lenq)) * self.m / lenq;
                    let u = x[i * len + j] + x[i * len + j + len / 2];
                    let v = (x[i * len + j] - x[i * len + j + len / 2]) * self.ksi_pows[idx];
                    x[i * len + j] = u;
                    x[i * len + j + len / 2] = v;
                }
            }
            len /= 2;
        }
        bitrev(x);
        for v in x.iter_mut() {
            *v /= n as f64;
        }
    }

    pub(crate) fn forward(&self, x: &mut [Complex64]) {
        let n = x.len();
        bitrev(x);

        let mut len = 2;
        while len <= n {
            let lenq = len << 2;
            for i in 0..n / len {
                for j in 0..len / 2 {
                    let idx = (self.rot_group[j] % lenq) * self.m / lenq;
                    let u = x[i * len + j];
                    let v = x[i * len + j + len / 2] * self.ksi_pows[idx];
                    x[i * len + j + len / 2] = u - v;
                    x[i * len + j] = u + v;
                }
            }
            len *= 2;
        }
    }
}
