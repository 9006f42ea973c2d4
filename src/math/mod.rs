//! Word-sized modular arithmetic, the negacyclic NTT and the special FFT
//! that back the RNS ring of the CKKS context.

pub(crate) mod fft;
pub(crate) mod finite_field;
pub(crate) mod ntt;
pub(crate) mod prime;
