/// An encoded message: m(X) in NTT form over the chain moduli q_0..q_level.
#[derive(Debug, Clone)]
pub struct Plaintext {
    pub(crate) msg: Vec<u64>,
    /// number of packed slots, a power of two
    pub(crate) slots: usize,
    pub(crate) level: usize,
    /// factor the slot values were multiplied by before rounding
    pub(crate) scale: f64,
}

impl Plaintext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn num_slots(&self) -> usize {
        self.slots
    }
}

/// An encrypted message. Immutable: every homomorphic operation returns a
/// fresh ciphertext and leaves its operands untouched.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    /// (c0, c1) satisfies c0 + c1 * s \approx m
    pub(crate) c0: Vec<u64>,
    pub(crate) c1: Vec<u64>,
    /// dimension of ring
    pub(crate) n: usize,
    /// the length of plaintext vector
    pub(crate) slots: usize,
    /// remaining multiplicative depth, the element lives over q_0..q_level
    pub(crate) level: usize,
    pub(crate) scale: f64,
}

impl Ciphertext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn num_slots(&self) -> usize {
        self.slots
    }

    pub fn ring_dimension(&self) -> usize {
        self.n
    }

    /// Number of chain moduli the components live over.
    pub(crate) fn num_moduli(&self) -> usize {
        self.level + 1
    }
}
