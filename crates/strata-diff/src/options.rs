//! Engine options: worker fan-out and cooperative cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::error::{DiffError, DiffResult};

/// Default number of directory pairs compared concurrently.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Shared cancellation flag.
///
/// Clones observe the same flag. Engines check it before every store fetch
/// and stop with [`DiffError::Cancelled`]; nothing built so far is published.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`DiffError::Cancelled`] once cancelled.
    pub fn check(&self) -> DiffResult<()> {
        if self.is_cancelled() {
            Err(DiffError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Knobs shared by every engine operation.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Maximum worker threads per diff level. `0` and `1` run inline.
    pub parallelism: usize,
    pub cancel: CancelToken,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            cancel: CancelToken::new(),
        }
    }
}

impl EngineOptions {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Map `f` over `items` with at most `parallelism` scoped workers.
///
/// Workers pull the next index from a shared counter. Results come back in
/// input order regardless of completion order. A panicking worker re-raises
/// its panic on the calling thread.
pub(crate) fn map_bounded<T, R, F>(items: &[T], parallelism: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if parallelism <= 1 || items.len() <= 1 {
        return items.iter().map(f).collect();
    }
    let workers = parallelism.min(items.len());
    let counter = AtomicUsize::new(0);
    let (next, f) = (&counter, &f);
    let mut indexed: Vec<(usize, R)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(i) else {
                            break;
                        };
                        done.push((i, f(item)));
                    }
                    done
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(DiffError::Cancelled)));
    }

    #[test]
    fn map_bounded_keeps_input_order() {
        let items: Vec<u32> = (0..50).collect();
        for parallelism in [0, 1, 3, 16, 100] {
            let doubled = map_bounded(&items, parallelism, |n| n * 2);
            let expected: Vec<u32> = items.iter().map(|n| n * 2).collect();
            assert_eq!(doubled, expected);
        }
    }

    #[test]
    fn options_builders() {
        let token = CancelToken::new();
        let opts = EngineOptions::default()
            .with_parallelism(8)
            .with_cancel(token.clone());
        assert_eq!(opts.parallelism, 8);
        token.cancel();
        assert!(opts.cancel.is_cancelled());
        assert_eq!(EngineOptions::default().parallelism, DEFAULT_PARALLELISM);
    }
}
