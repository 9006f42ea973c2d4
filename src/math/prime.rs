use super::finite_field::{modpow, mul_mod};

/// Bases that make Miller-Rabin deterministic for every n < 2^64.
const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// miller rabin prime test
pub(crate) fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    // n-1 = 2^k * q, with q odd
    let (k, q) = {
        let mut k = 0;
        let mut q = n - 1;
        while q % 2 == 0 {
            k += 1;
            q /= 2;
        }
        (k, q)
    };

    'witness: for a in WITNESSES {
        let mut x = modpow(a, q, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..k {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

/// Walks downwards from `upper` over the values congruent to 1 modulo `m`
/// and returns the first prime strictly below `upper` that is not in `taken`.
pub(crate) fn prime_below(upper: u64, m: u64, taken: &[u64]) -> Option<u64> {
    let mut candidate = (upper - 1) / m * m + 1;
    if candidate >= upper {
        candidate = candidate.checked_sub(m)?;
    }
    while candidate > m {
        if is_prime(candidate) && !taken.contains(&candidate) {
            return Some(candidate);
        }
        candidate -= m;
    }
    None
}

/// Finds a primitive m-th root of unity modulo the prime q, where m is a
/// power of two dividing q - 1.
pub(crate) fn primitive_root_of_unity(m: u64, q: u64) -> u64 {
    debug_assert!(m.is_power_of_two() && (q - 1) % m == 0);
    let exponent = (q - 1) / m;
    // psi is primitive iff psi^(m/2) = -1
    (2..q)
        .map(|x| modpow(x, exponent, q))
        .find(|psi| modpow(*psi, m / 2, q) == q - 1)
        .expect("q - 1 is divisible by m, so a primitive root of unity exists")
}
