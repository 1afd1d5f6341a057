use serde::{Deserialize, Serialize};

/// Number of counters carried by one [`Sample`].
pub const SAMPLE_COLUMNS: usize = 4;

/// Identifier of a traffic class.
pub type ClassId = u32;

/// Largest accepted class id. Confusion matrices are indexed by id, so the
/// bound keeps them small.
pub const MAX_CLASS_ID: ClassId = 1023;

/// One fixed-duration traffic interval.
///
/// Column order (`bytes_up`, `bytes_down`, `packets_up`, `packets_down`) is the
/// order of the dataset files and of every per-column feature block.
///
/// # Example
/// ```
/// use tc_core::sample::Sample;
/// let s = Sample::new(10, 20, 1, 2);
/// assert_eq!(s.columns(), [10, 20, 1, 2]);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Bytes sent during the interval.
    pub bytes_up: u64,
    /// Bytes received during the interval.
    pub bytes_down: u64,
    /// Packets sent during the interval.
    pub packets_up: u64,
    /// Packets received during the interval.
    pub packets_down: u64,
}

impl Sample {
    #[must_use]
    pub fn new(bytes_up: u64, bytes_down: u64, packets_up: u64, packets_down: u64) -> Self {
        Self {
            bytes_up,
            bytes_down,
            packets_up,
            packets_down,
        }
    }

    /// Counters in file column order.
    #[inline]
    #[must_use]
    pub fn columns(&self) -> [u64; SAMPLE_COLUMNS] {
        [
            self.bytes_up,
            self.bytes_down,
            self.packets_up,
            self.packets_down,
        ]
    }

    /// Counter at column `c` (0..4).
    #[inline]
    #[must_use]
    pub fn column(&self, c: usize) -> u64 {
        self.columns()[c]
    }
}

impl From<[u64; SAMPLE_COLUMNS]> for Sample {
    fn from(v: [u64; SAMPLE_COLUMNS]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// A traffic class: integer label plus a human-readable name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficClass {
    /// Label used in predictions and the confusion matrix.
    pub id: ClassId,
    /// Display name ("YouTube", "Mining (Neoscrypt - 4T CPU)", ...).
    pub name: String,
}

impl TrafficClass {
    #[must_use]
    pub fn new(id: ClassId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
