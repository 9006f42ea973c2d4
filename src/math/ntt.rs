use super::{
    finite_field::{add_mod, inv_mod, mul_mod, sub_mod},
    prime::primitive_root_of_unity,
};

pub(crate) fn is_power_of_two(n: usize) -> bool {
    n != 0 && 1 << (63 - n.leading_zeros()) == n
}

/// bit reversal
/// the length of x should be a power of two
pub(crate) fn bitrev<T: Copy>(x: &mut [T]) {
    let n = x.len();
    if !is_power_of_two(n) {
        panic!("The length n of x must be a power of two");
    }

    let mut rho = vec![0usize; n];
    let mut k = 2;

    while k <= n {
        // compute rho_k(0: k-1)
        for i in 0..k / 2 {
            rho[i + k / 2] = 2 * rho[i] + 1;
            rho[i] = 2 * rho[i];
        }
        k *= 2;
    }

    for i in 0..n {
        if i < rho[i] {
            x.swap(i, rho[i]);
        }
    }
}

/// Precomputed tables for the negacyclic NTT over Z_q[X]/(X^N + 1).
///
/// The forward transform takes coefficients in natural order and leaves the
/// evaluations in bit-reversed order; the inverse undoes exactly that, so
/// pointwise products never need to know the ordering.
#[derive(Debug, Clone)]
pub(crate) struct NttTable {
    q: u64,
    n: usize,
    /// psi^{bitrev(i)} where psi is a primitive 2N-th root of unity
    psi_rev: Vec<u64>,
    /// psi^{-bitrev(i)}
    psi_inv_rev: Vec<u64>,
    n_inv: u64,
}

impl NttTable {
    pub(crate) fn new(q: u64, n: usize) -> Self {
        assert!(is_power_of_two(n));
        let psi = primitive_root_of_unity(2 * n as u64, q);
        let psi_inv = inv_mod(psi, q);

        let mut psi_rev = generate_power_table(psi, n, q);
        let mut psi_inv_rev = generate_power_table(psi_inv, n, q);
        bitrev(&mut psi_rev);
        bitrev(&mut psi_inv_rev);

        Self {
            q,
            n,
            psi_rev,
            psi_inv_rev,
            n_inv: inv_mod(n as u64, q),
        }
    }

    pub(crate) fn modulus(&self) -> u64 {
        self.q
    }

    /// Cooley-Tukey butterflies, merged with the twist by powers of psi.
    pub(crate) fn forward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.n);
        let q = self.q;
        let mut t = self.n;
        let mut m = 1;
        while m < self.n {
            t /= 2;
            for i in 0..m {
                let s = self.psi_rev[m + i];
                let j1 = 2 * i * t;
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = mul_mod(a[j + t], s, q);
                    a[j] = add_mod(u, v, q);
                    a[j + t] = sub_mod(u, v, q);
                }
            }
            m *= 2;
        }
    }

    /// Gentleman-Sande butterflies, followed by the scaling by N^{-1}.
    pub(crate) fn backward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.n);
        let q = self.q;
        let mut t = 1;
        let mut m = self.n;
        while m > 1 {
            let h = m / 2;
            let mut j1 = 0;
            for i in 0..h {
                let s = self.psi_inv_rev[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = add_mod(u, v, q);
                    a[j + t] = mul_mod(sub_mod(u, v, q), s, q);
                }
                j1 += 2 * t;
            }
            t *= 2;
            m = h;
        }
        for x in a.iter_mut() {
            *x = mul_mod(*x, self.n_inv, q);
        }
    }
}

/// [1, root, root^2, ..., root^{n-1}] modulo q
pub(crate) fn generate_power_table(root: u64, n: usize, q: u64) -> Vec<u64> {
    let mut pow_table = vec![0u64; n];
    let mut temp = 1u64;
    for x in pow_table.iter_mut() {
        *x = temp;
        temp = mul_mod(temp, root, q);
    }
    pow_table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{finite_field::reduce_i128, prime::prime_below};
    use rand::Rng;

    fn naive_negacyclic_mul(a: &[u64], b: &[u64], q: u64) -> Vec<u64> {
        let n = a.len();
        let mut res = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let c = mul_mod(a[i], b[j], q);
                let k = i + j;
                if k < n {
                    res[k] = add_mod(res[k], c, q);
                } else {
                    // X^n + 1 = 0
                    res[k - n] = sub_mod(res[k - n], c, q);
                }
            }
        }
        res
    }

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(8));
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(78));
        assert!(!is_power_of_two(0));
    }

    #[test]
    fn test_bitrev() {
        let mut x = [0, 1, 2, 3, 4, 5, 6, 7];
        bitrev(&mut x);
        assert_eq!(x, [0, 4, 2, 6, 1, 5, 3, 7]);
    }

    #[test]
    fn test_ntt_round_trip() {
        let n = 64;
        let q = prime_below(1 << 60, 2 * n as u64, &[]).unwrap();
        let table = NttTable::new(q, n);
        let mut rng = rand::thread_rng();
        let mut x: Vec<u64> = (0..n).map(|_| rng.gen_range(0..q)).collect();
        let original_x = x.clone();
        table.forward(&mut x);
        assert_ne!(x, original_x);
        table.backward(&mut x);
        assert_eq!(x, original_x);
    }

    #[test]
    fn test_ntt_negacyclic_product() {
        let n = 32;
        let q = prime_below(1 << 45, 2 * n as u64, &[]).unwrap();
        let table = NttTable::new(q, n);
        let mut rng = rand::thread_rng();
        let a: Vec<u64> = (0..n).map(|_| reduce_i128(rng.gen_range(-50..50), q)).collect();
        let b: Vec<u64> = (0..n).map(|_| rng.gen_range(0..q)).collect();
        let expected = naive_negacyclic_mul(&a, &b, q);

        let (mut a_hat, mut b_hat) = (a.clone(), b.clone());
        table.forward(&mut a_hat);
        table.forward(&mut b_hat);
        let mut c: Vec<u64> = a_hat
            .iter()
            .zip(b_hat.iter())
            .map(|(x, y)| mul_mod(*x, *y, q))
            .collect();
        table.backward(&mut c);
        assert_eq!(c, expected);
    }
}
