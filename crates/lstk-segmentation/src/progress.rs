//! Progress tracking and callbacks for iterative refinement.
//!
//! Level-set refiners report every iteration to a [`ProgressTracker`], which
//! fans the information out to registered [`ProgressCallback`]s.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Progress information for one refinement iteration.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Name of the reporting stage (e.g. "geodesic-active-contour").
    pub stage: &'static str,
    /// Current iteration number (1-based).
    pub iteration: usize,
    /// Iteration cap.
    pub total_iterations: Option<usize>,
    /// Root-mean-square change of the surface in this iteration.
    pub rms_change: f64,
    /// Time step used for this iteration.
    pub time_step: f64,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    pub fn new(
        stage: &'static str,
        iteration: usize,
        total_iterations: Option<usize>,
        rms_change: f64,
        time_step: f64,
        elapsed: Duration,
    ) -> Self {
        Self {
            stage,
            iteration,
            total_iterations,
            rms_change,
            time_step,
            elapsed,
            estimated_remaining: None,
        }
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations.map(|total| {
            (self.iteration as f64 / total.max(1) as f64) * 100.0
        })
    }

    /// Calculate estimated remaining time (upper bound: assumes the cap is hit).
    pub fn calculate_remaining(&mut self) {
        if let Some(total) = self.total_iterations {
            if self.iteration > 0 {
                let avg_time_per_iter = self.elapsed.as_secs_f64() / self.iteration as f64;
                let remaining_iters = total.saturating_sub(self.iteration);
                self.estimated_remaining = Some(Duration::from_secs_f64(
                    avg_time_per_iter * remaining_iters as f64
                ));
            }
        }
    }
}

/// Progress callback trait for monitoring refinement.
pub trait ProgressCallback: Send + Sync {
    /// Called at each iteration with progress information.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when a stage starts.
    fn on_start(&self, _stage: &'static str) {}

    /// Called when a stage stops, converged or not.
    fn on_complete(&self, _info: &ProgressInfo, _converged: bool) {}
}

/// Callback that logs through `tracing`.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 10 }
    }
}

impl ConsoleProgressCallback {
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.iteration % self.log_interval == 0 || info.total_iterations == Some(info.iteration) {
            let remaining = info.estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "{} iter {}/{} ({:.1}%) | RMS change: {:.6} | dt: {:.4} | Elapsed: {:.2}s | ETA: {}",
                info.stage,
                info.iteration,
                info.total_iterations.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                info.progress_percent().unwrap_or(0.0),
                info.rms_change,
                info.time_step,
                info.elapsed.as_secs_f64(),
                remaining
            );
        }
    }

    fn on_start(&self, stage: &'static str) {
        tracing::info!("{} started", stage);
    }

    fn on_complete(&self, info: &ProgressInfo, converged: bool) {
        tracing::info!(
            "{} stopped after {} iterations in {:.2}s (RMS change {:.6}, converged: {})",
            info.stage,
            info.iteration,
            info.elapsed.as_secs_f64(),
            info.rms_change,
            converged
        );
    }
}

/// Callback that records every iteration.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        self.lock().clone()
    }

    /// Clear the history.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressInfo>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        self.lock().push(info.clone());
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Option<Instant>,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Start tracking a stage.
    pub fn start(&mut self, stage: &'static str) {
        self.start_time = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start(stage);
        }
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Report one iteration.
    pub fn update(
        &self,
        stage: &'static str,
        iteration: usize,
        total_iterations: Option<usize>,
        rms_change: f64,
        time_step: f64,
    ) {
        if self.callbacks.is_empty() {
            return;
        }
        let mut info = ProgressInfo::new(stage, iteration, total_iterations, rms_change, time_step, self.elapsed());
        info.calculate_remaining();

        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// Report the end of a stage.
    pub fn complete(&self, stage: &'static str, iterations: usize, rms_change: f64, converged: bool) {
        let info = ProgressInfo::new(stage, iterations, None, rms_change, 0.0, self.elapsed());
        for callback in &self.callbacks {
            callback.on_complete(&info, converged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_info() {
        let info = ProgressInfo::new("gac", 10, Some(100), 0.5, 0.1, Duration::from_secs(10));
        assert_eq!(info.iteration, 10);
        assert_eq!(info.progress_percent(), Some(10.0));
    }

    #[test]
    fn test_progress_info_remaining() {
        let mut info = ProgressInfo::new("gac", 10, Some(100), 0.5, 0.1, Duration::from_secs(10));
        info.calculate_remaining();
        let remaining = info.estimated_remaining.unwrap();
        assert!((remaining.as_secs_f64() - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_tracker_fans_out_to_history() {
        let history = Arc::new(HistoryCallback::new());
        let mut tracker = ProgressTracker::new();
        tracker.add_callback(history.clone());
        tracker.start("spf");
        tracker.update("spf", 1, Some(3), 0.3, 0.2);
        tracker.update("spf", 2, Some(3), 0.1, 0.2);

        let recorded = history.get_history();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].stage, "spf");
        assert_eq!(recorded[1].rms_change, 0.1);

        history.clear();
        assert!(history.get_history().is_empty());
    }
}
