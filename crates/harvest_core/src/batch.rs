use std::fmt;

/// Largest batch the provider accepts in one submission.
pub const MAX_BATCH_SIZE: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("batch size must be between 1 and {max}, got {got}")]
pub struct BatchSizeError {
    pub got: usize,
    pub max: usize,
}

/// Number of queries per submission, always within `1..=MAX_BATCH_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchSize(usize);

impl BatchSize {
    pub fn new(size: usize) -> Result<Self, BatchSizeError> {
        if (1..=MAX_BATCH_SIZE).contains(&size) {
            Ok(Self(size))
        } else {
            Err(BatchSizeError {
                got: size,
                max: MAX_BATCH_SIZE,
            })
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self(DEFAULT_BATCH_SIZE)
    }
}

impl TryFrom<usize> for BatchSize {
    type Error = BatchSizeError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split queries into consecutive batches of at most `size`, preserving order.
///
/// Produces exactly `ceil(len / size)` batches; an empty input yields none.
pub fn plan_batches(queries: &[String], size: BatchSize) -> Vec<Vec<String>> {
    queries
        .chunks(size.get())
        .map(<[String]>::to_vec)
        .collect()
}
