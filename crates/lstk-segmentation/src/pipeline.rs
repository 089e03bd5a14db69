//! Modification stamps for lazy, dirty-tracked recomputation.
//!
//! Every setter and every produced output takes a fresh [`Stamp`] from a
//! process-wide counter. A module remembers the stamps of everything it
//! consumed in a [`Dependencies`] record; when any of them differs from the
//! current ones the cached output is stale and the stage runs again.

use std::sync::atomic::{AtomicU64, Ordering};

static CLOCK: AtomicU64 = AtomicU64::new(1);

/// Point on the global modification clock. Later stamps compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp(u64);

impl Stamp {
    /// Take the next stamp.
    pub fn next() -> Self {
        Self(CLOCK.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Stamps of the inputs and parameters an output was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dependencies(Vec<Stamp>);

impl Dependencies {
    pub fn new(stamps: impl IntoIterator<Item = Stamp>) -> Self {
        Self(stamps.into_iter().collect())
    }
}

/// A value together with the stamp of when it was produced or set.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    value: T,
    stamp: Stamp,
}

impl<T> Stamped<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            stamp: Stamp::next(),
        }
    }

    /// Wrap a value that was produced upstream under `stamp`.
    pub fn with_stamp(value: T, stamp: Stamp) -> Self {
        Self { value, stamp }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }
}

/// A cached stage output and the dependencies it was computed from.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    output: Stamped<T>,
    dependencies: Dependencies,
}

impl<T> Cached<T> {
    pub fn new(value: T, dependencies: Dependencies) -> Self {
        Self {
            output: Stamped::new(value),
            dependencies,
        }
    }

    /// True when the output was computed from exactly `dependencies`.
    pub fn is_current(&self, dependencies: &Dependencies) -> bool {
        &self.dependencies == dependencies
    }

    pub fn value(&self) -> &T {
        self.output.value()
    }

    pub fn stamp(&self) -> Stamp {
        self.output.stamp()
    }
}

/// Helper for the common "optional cache" field of a module.
pub fn current<'a, T>(cache: &'a Option<Cached<T>>, dependencies: &Dependencies) -> Option<&'a Cached<T>> {
    cache.as_ref().filter(|c| c.is_current(dependencies))
}
