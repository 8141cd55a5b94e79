use serde::{Deserialize, Serialize};

/// Unix time in seconds.
pub type UnixTime = i64;

/// An entry of a time-indexed series.
pub trait Sample {
    fn time(&self) -> UnixTime;
}

/// Append-only log of samples, logically ordered by non-decreasing time.
///
/// Ordering is the caller's responsibility: `append` does not re-sort, and
/// every query walks the entries as they were pushed. All lookups return
/// `None` instead of failing, since an empty series is the normal state of a
/// freshly discovered token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries<T> {
    entries: Vec<T>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Sample> TimeSeries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Most recently appended entry.
    pub fn latest(&self) -> Option<&T> {
        self.entries.last()
    }

    /// Latest entry with `time <= at`, scanning backwards from the newest one.
    ///
    /// Last-value-hold: a query between two samples yields the earlier one,
    /// and a query before the first sample yields `None`.
    pub fn at_time(&self, at: UnixTime) -> Option<&T> {
        self.entries.iter().rev().find(|entry| entry.time() <= at)
    }

    pub fn at_index(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }
}

impl<T> FromIterator<T> for TimeSeries<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
