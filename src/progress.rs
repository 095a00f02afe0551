//! Progress reporting for batch warps.
//!
//! Warping a large batch at a high UV resolution takes long enough that a
//! command-line caller wants feedback. Entry points that accept a
//! [`Progress`] report once per pipeline stage.
//!
//! ```
//! use uvwarp::progress::Progress;
//!
//! let progress = Progress::new(|current, total, stage| {
//!     eprintln!("[{}/{}] {}", current, total, stage);
//! });
//! progress.report(1, 4, "gather");
//! ```

/// A callback receiving `(current, total, stage)` updates.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report that `current` of `total` steps are done.
    #[inline]
    pub fn report(&self, current: usize, total: usize, stage: &str) {
        (self.callback)(current, total, stage);
    }

    /// A reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
