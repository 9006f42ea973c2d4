//! Arithmetic in Z_q for a prime q known only at run time.
//!
//! All moduli handled here are below 2^62, so sums of two reduced values
//! never overflow a u64 and products are computed in u128.

#[inline]
pub(crate) fn add_mod(a: u64, b: u64, q: u64) -> u64 {
    let s = a + b;
    if s >= q {
        s - q
    } else {
        s
    }
}

#[inline]
pub(crate) fn sub_mod(a: u64, b: u64, q: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        a + q - b
    }
}

#[inline]
pub(crate) fn neg_mod(a: u64, q: u64) -> u64 {
    if a == 0 {
        0
    } else {
        q - a
    }
}

#[inline]
pub(crate) fn mul_mod(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

pub(crate) fn modpow(mut a: u64, mut n: u64, q: u64) -> u64 {
    let mut res = 1 % q;
    a %= q;
    while n > 0 {
        if n & 1 == 1 {
            res = mul_mod(res, a, q);
        }
        a = mul_mod(a, a, q);
        n >>= 1;
    }
    res
}

/// Inverse of a modulo a prime q, by Fermat's little theorem.
pub(crate) fn inv_mod(a: u64, q: u64) -> u64 {
    debug_assert!(a % q != 0, "zero has no inverse");
    modpow(a, q - 2, q)
}

/// Reduces a signed integer into [0, q).
#[inline]
pub(crate) fn reduce_i128(x: i128, q: u64) -> u64 {
    x.rem_euclid(q as i128) as u64
}

/// Takes a residue modulo `from`, interprets it in the centered range
/// (-from/2, from/2] and reduces it modulo `to`.
#[inline]
pub(crate) fn reduce_centered(x: u64, from: u64, to: u64) -> u64 {
    if x > from / 2 {
        neg_mod((from - x) % to, to)
    } else {
        x % to
    }
}
