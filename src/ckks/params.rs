use super::error::{CkksError, Result};

/// Bit size of q_0, the last prime standing once every level is consumed.
pub const FIRST_MOD_BITS: u32 = 60;
/// Bit size of the special prime used only inside key switching.
pub const SPECIAL_MOD_BITS: u32 = 61;
/// Standard deviation of the error distribution.
pub const DEFAULT_SIGMA: f64 = 3.2;

const MIN_SCALE_BITS: u32 = 20;
const MAX_SCALE_BITS: u32 = 58;
const MIN_LOG_N: u32 = 10;
const MAX_LOG_N: u32 = 15;

/// Target security of the parameter set, following the homomorphic
/// encryption security standard for ternary secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurityLevel {
    #[default]
    Classic128,
    Classic192,
    Classic256,
    /// No security guarantee, the ring dimension is taken as given.
    NotSet,
}

impl SecurityLevel {
    /// Largest log2(QP) allowed for ring dimension 2^log_n.
    fn max_log_qp(&self, log_n: u32) -> Option<u32> {
        let table: [u32; 6] = match self {
            SecurityLevel::Classic128 => [27, 54, 109, 218, 438, 881],
            SecurityLevel::Classic192 => [19, 37, 75, 152, 305, 611],
            SecurityLevel::Classic256 => [14, 29, 58, 118, 237, 476],
            SecurityLevel::NotSet => return Some(u32::MAX),
        };
        log_n
            .checked_sub(MIN_LOG_N)
            .and_then(|i| table.get(i as usize).copied())
    }
}

/// The immutable parameter set of a CKKS context.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeParameters {
    mult_depth: usize,
    scale_factor_bits: u32,
    batch_size: usize,
    security_level: SecurityLevel,
    ring_dimension: usize,
    sigma: f64,
}

impl SchemeParameters {
    /// Parameters for 128-bit classical security.
    pub fn new(mult_depth: usize, scale_factor_bits: u32, batch_size: usize) -> Result<Self> {
        Self::builder(mult_depth, scale_factor_bits, batch_size).build()
    }

    pub fn builder(
        mult_depth: usize,
        scale_factor_bits: u32,
        batch_size: usize,
    ) -> SchemeParametersBuilder {
        SchemeParametersBuilder {
            mult_depth,
            scale_factor_bits,
            batch_size,
            security_level: SecurityLevel::default(),
            ring_dimension: None,
            sigma: DEFAULT_SIGMA,
        }
    }

    pub fn mult_depth(&self) -> usize {
        self.mult_depth
    }

    pub fn scale_factor_bits(&self) -> u32 {
        self.scale_factor_bits
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn ring_dimension(&self) -> usize {
        self.ring_dimension
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Number of slots actually packed: the batch size rounded up to a power of two.
    pub fn slots(&self) -> usize {
        self.batch_size.next_power_of_two()
    }

    /// The default scaling factor 2^scale_factor_bits.
    pub fn scale(&self) -> f64 {
        (self.scale_factor_bits as f64).exp2()
    }

    pub fn log_qp(&self) -> u32 {
        estimate_log_qp(self.mult_depth, self.scale_factor_bits)
    }
}

fn estimate_log_qp(mult_depth: usize, scale_factor_bits: u32) -> u32 {
    u32::try_from(mult_depth)
        .unwrap_or(u32::MAX)
        .saturating_mul(scale_factor_bits)
        .saturating_add(FIRST_MOD_BITS + SPECIAL_MOD_BITS)
}

#[derive(Debug, Clone)]
pub struct SchemeParametersBuilder {
    mult_depth: usize,
    scale_factor_bits: u32,
    batch_size: usize,
    security_level: SecurityLevel,
    ring_dimension: Option<usize>,
    sigma: f64,
}

impl SchemeParametersBuilder {
    pub fn security_level(mut self, security_level: SecurityLevel) -> Self {
        self.security_level = security_level;
        self
    }

    /// Requests a ring dimension. With a security level set it must be at
    /// least the minimum the level requires.
    pub fn ring_dimension(mut self, ring_dimension: usize) -> Self {
        self.ring_dimension = Some(ring_dimension);
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn build(self) -> Result<SchemeParameters> {
        if self.batch_size == 0 {
            return Err(CkksError::InvalidParameters(
                "batch size must be positive".to_string(),
            ));
        }
        if !(MIN_SCALE_BITS..=MAX_SCALE_BITS).contains(&self.scale_factor_bits) {
            return Err(CkksError::InvalidParameters(format!(
                "scale factor bits must be in [{}, {}], got {}",
                MIN_SCALE_BITS, MAX_SCALE_BITS, self.scale_factor_bits
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(CkksError::InvalidParameters(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }

        let slots = self.batch_size.next_power_of_two();
        let ring_dimension = self.choose_ring_dimension(slots)?;

        Ok(SchemeParameters {
            mult_depth: self.mult_depth,
            scale_factor_bits: self.scale_factor_bits,
            batch_size: self.batch_size,
            security_level: self.security_level,
            ring_dimension,
            sigma: self.sigma,
        })
    }

    fn choose_ring_dimension(&self, slots: usize) -> Result<usize> {
        let log_qp = estimate_log_qp(self.mult_depth, self.scale_factor_bits);
        let max_n = 1usize << MAX_LOG_N;

        if let Some(n) = self.ring_dimension {
            if !n.is_power_of_two() || n > max_n {
                return Err(CkksError::InvalidParameters(format!(
                    "ring dimension must be a power of two not above {}, got {}",
                    max_n, n
                )));
            }
        }

        let minimum = if self.security_level == SecurityLevel::NotSet {
            (2 * slots).max(4)
        } else {
            (MIN_LOG_N..=MAX_LOG_N)
                .find(|log_n| {
                    (1usize << log_n) >= 2 * slots
                        && self
                            .security_level
                            .max_log_qp(*log_n)
                            .map_or(false, |max| log_qp <= max)
                })
                .map(|log_n| 1usize << log_n)
                .ok_or_else(|| {
                    CkksError::InvalidParameters(format!(
                        "no ring dimension up to {} supports log2(QP) = {} with {} slots at {:?}",
                        max_n, log_qp, slots, self.security_level
                    ))
                })?
        };

        match self.ring_dimension {
            Some(n) if n < minimum => Err(CkksError::InvalidParameters(format!(
                "ring dimension {} is below the required minimum {}",
                n, minimum
            ))),
            Some(n) => Ok(n),
            None if minimum > max_n => Err(CkksError::InvalidParameters(format!(
                "batch size {} needs a ring dimension above {}",
                self.batch_size, max_n
            ))),
            None => Ok(minimum),
        }
    }
}
