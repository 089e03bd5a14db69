//! Heap-ordered front propagation on a regular lattice.
//!
//! Solves the eikonal equation `|∇T| F = 1` with first-order upwind
//! differences. Each sample moves Far → Trial → Known exactly once through
//! Known; Known arrival times are final.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use lstk_core::{Lattice, Spacing};

/// Speeds below this value are impassable.
pub const MINIMUM_SPEED: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Far,
    Trial,
    Known,
}

/// Speed source for a march.
#[derive(Debug, Clone, Copy)]
pub enum Speed<'a> {
    /// Same speed everywhere.
    Uniform(f64),
    /// One speed per lattice sample.
    Field(&'a [f64]),
}

impl Speed<'_> {
    #[inline]
    fn at(&self, offset: usize) -> f64 {
        match self {
            Speed::Uniform(s) => *s,
            Speed::Field(values) => values[offset],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrialPoint {
    time: f64,
    offset: usize,
}

impl PartialEq for TrialPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TrialPoint {}

impl PartialOrd for TrialPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TrialPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.offset.cmp(&other.offset))
    }
}

/// Result of a march: arrival times and which samples the front reached.
#[derive(Debug, Clone)]
pub struct ArrivalTimes {
    times: Vec<f64>,
    labels: Vec<Label>,
    known: usize,
}

impl ArrivalTimes {
    /// Arrival time at `offset` (`f64::INFINITY` when unreached).
    pub fn time(&self, offset: usize) -> f64 {
        self.times[offset]
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// True for Known and Trial samples.
    pub fn is_reached(&self, offset: usize) -> bool {
        self.labels[offset] != Label::Far
    }

    pub fn is_known(&self, offset: usize) -> bool {
        self.labels[offset] == Label::Known
    }

    /// Number of samples frozen as Known.
    pub fn known_count(&self) -> usize {
        self.known
    }

    /// Largest arrival time over reached samples.
    pub fn max_reached(&self) -> Option<f64> {
        self.times
            .iter()
            .zip(&self.labels)
            .filter(|(_, l)| **l != Label::Far)
            .map(|(t, _)| *t)
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
    }
}

/// Fast-marching engine bound to a lattice and its physical spacing.
#[derive(Debug, Clone, Copy)]
pub struct FastMarcher<const D: usize> {
    lattice: Lattice<D>,
    spacing: [f64; D],
}

impl<const D: usize> FastMarcher<D> {
    pub fn new(lattice: Lattice<D>, spacing: &Spacing<D>) -> Self {
        let mut h = [1.0; D];
        for (axis, value) in h.iter_mut().enumerate() {
            *value = spacing[axis];
        }
        Self::from_parts(lattice, h)
    }

    pub fn from_parts(lattice: Lattice<D>, spacing: [f64; D]) -> Self {
        Self { lattice, spacing }
    }

    pub fn lattice(&self) -> &Lattice<D> {
        &self.lattice
    }

    pub fn spacing(&self) -> &[f64; D] {
        &self.spacing
    }

    /// Propagate from `trial` points (offset, initial time) until the smallest
    /// trial time exceeds `stopping_value` or the heap runs dry.
    ///
    /// Offsets must lie inside the lattice. Duplicate trial offsets keep the
    /// smallest time.
    pub fn march(&self, speed: Speed<'_>, trial: &[(usize, f64)], stopping_value: f64) -> ArrivalTimes {
        let n = self.lattice.len();
        let mut times = vec![f64::INFINITY; n];
        let mut labels = vec![Label::Far; n];
        let mut heap = BinaryHeap::new();
        let mut known = 0usize;

        for &(offset, time) in trial {
            if time < times[offset] {
                times[offset] = time;
                labels[offset] = Label::Trial;
                heap.push(Reverse(TrialPoint { time, offset }));
            }
        }

        while let Some(Reverse(point)) = heap.pop() {
            if labels[point.offset] == Label::Known || point.time > times[point.offset] {
                continue;
            }
            if point.time > stopping_value {
                break;
            }
            labels[point.offset] = Label::Known;
            known += 1;

            for neighbor in self.lattice.face_neighbors(point.offset) {
                if labels[neighbor] == Label::Known {
                    continue;
                }
                let f = speed.at(neighbor);
                if !(f >= MINIMUM_SPEED) {
                    continue;
                }
                let candidate = self.solve(neighbor, f, &times, &labels);
                if candidate < times[neighbor] {
                    times[neighbor] = candidate;
                    labels[neighbor] = Label::Trial;
                    heap.push(Reverse(TrialPoint {
                        time: candidate,
                        offset: neighbor,
                    }));
                }
            }
        }

        ArrivalTimes { times, labels, known }
    }

    /// Upwind update: solve `Σ max(0, (T - T_i) / h_i)^2 = 1 / F^2` over the
    /// Known neighbours, adding axes in increasing order of `T_i`.
    fn solve(&self, offset: usize, speed: f64, times: &[f64], labels: &[Label]) -> f64 {
        let mut upwind: Vec<(f64, f64)> = Vec::with_capacity(D);
        for axis in 0..D {
            let best = [-1isize, 1]
                .into_iter()
                .filter_map(|step| self.lattice.neighbor(offset, axis, step))
                .filter(|&o| labels[o] == Label::Known)
                .map(|o| times[o])
                .fold(f64::INFINITY, f64::min);
            if best.is_finite() {
                upwind.push((best, self.spacing[axis]));
            }
        }
        upwind.sort_by(|a, b| a.0.total_cmp(&b.0));

        let rhs = 1.0 / (speed * speed);
        let (mut a, mut b, mut c) = (0.0, 0.0, -rhs);
        let mut solution = f64::INFINITY;
        for &(t, h) in &upwind {
            if solution <= t {
                break;
            }
            let w = 1.0 / (h * h);
            let (na, nb, nc) = (a + w, b - 2.0 * t * w, c + t * t * w);
            let discriminant = nb * nb - 4.0 * na * nc;
            if discriminant < 0.0 {
                break;
            }
            a = na;
            b = nb;
            c = nc;
            solution = (-b + discriminant.sqrt()) / (2.0 * a);
        }
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_dimensional_distance() {
        let lattice = Lattice::new([11]);
        let marcher = FastMarcher::new(lattice, &Spacing::uniform(0.5));
        let result = marcher.march(Speed::Uniform(1.0), &[(0, 0.0)], f64::MAX);
        for i in 0..11 {
            assert!((result.time(i) - 0.5 * i as f64).abs() < 1e-12);
        }
        assert_eq!(result.known_count(), 11);
    }

    #[test]
    fn test_speed_scales_time() {
        let lattice = Lattice::new([1, 9]);
        let marcher = FastMarcher::new(lattice, &Spacing::uniform(1.0));
        let result = marcher.march(Speed::Uniform(2.0), &[(4, 0.0)], f64::MAX);
        assert!((result.time(8) - 2.0).abs() < 1e-12);
        assert!((result.time(0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_is_shorter_than_manhattan() {
        let lattice = Lattice::new([21, 21]);
        let marcher = FastMarcher::new(lattice, &Spacing::uniform(1.0));
        let result = marcher.march(Speed::Uniform(1.0), &[(lattice.offset([10, 10]), 0.0)], f64::MAX);
        let diagonal = result.time(lattice.offset([15, 15]));
        let exact = (50.0f64).sqrt();
        assert!(diagonal < 10.0);
        assert!((diagonal - exact).abs() < 1.5);
    }

    #[test]
    fn test_stopping_value_limits_front() {
        let lattice = Lattice::new([1, 30]);
        let marcher = FastMarcher::new(lattice, &Spacing::uniform(1.0));
        let result = marcher.march(Speed::Uniform(1.0), &[(0, 0.0)], 5.0);
        assert!(result.is_known(5));
        assert!(!result.is_known(6));
        assert!(result.is_reached(6));
        assert!(!result.is_reached(7));
        assert_eq!(result.max_reached(), Some(6.0));
    }

    #[test]
    fn test_zero_speed_blocks_front() {
        let lattice = Lattice::new([1, 10]);
        let mut speed = vec![1.0; 10];
        speed[5] = 0.0;
        let marcher = FastMarcher::new(lattice, &Spacing::uniform(1.0));
        let result = marcher.march(Speed::Field(&speed), &[(0, 0.0)], f64::MAX);
        assert!(result.is_known(4));
        assert!(!result.is_reached(5));
        assert!(!result.is_reached(9));
        assert_eq!(result.time(9), f64::INFINITY);
    }

    #[test]
    fn test_negative_initial_time() {
        let lattice = Lattice::new([5]);
        let marcher = FastMarcher::new(lattice, &Spacing::uniform(1.0));
        let result = marcher.march(Speed::Uniform(1.0), &[(2, -1.5), (2, 3.0)], f64::MAX);
        assert_eq!(result.time(2), -1.5);
        assert!((result.time(4) - 0.5).abs() < 1e-12);
    }
}
