//! Ordered disposal tracking.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::key::Key;
use crate::provider::{AnyArc, HookSet};

/// One tracked instance with its disposal hooks.
struct DisposeEntry {
    key: Key,
    value: AnyArc,
    hooks: HookSet,
}

/// Container for disposal entries, run in strict reverse construction
/// order. Hook failures are logged and the walk continues, so teardown
/// always makes progress.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<DisposeEntry>,
}

impl DisposeBag {
    /// Tracks an instance; entries run LIFO relative to push order.
    pub(crate) fn track(&mut self, key: Key, value: AnyArc, hooks: HookSet) {
        self.entries.push(DisposeEntry { key, value, hooks });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every sync hook in reverse order. Async hooks cannot run on
    /// this path; each one is logged and skipped, so prefer the async
    /// teardown APIs when async disposers are registered.
    pub(crate) fn run_reverse_sync(&mut self) {
        while let Some(entry) = self.entries.pop() {
            if let Some(dispose) = &entry.hooks.dispose {
                let result = catch_unwind(AssertUnwindSafe(|| dispose(&entry.value)));
                if result.is_err() {
                    warn!(key = %entry.key, "dispose hook panicked; continuing teardown");
                }
            } else if entry.hooks.dispose_async.is_some() {
                warn!(
                    key = %entry.key,
                    "async dispose hook skipped during synchronous teardown; \
                     use the async scope or shutdown APIs"
                );
            }
        }
    }

    /// Runs every hook in strict reverse order, awaiting async ones.
    pub(crate) async fn run_reverse_async(&mut self) {
        while let Some(entry) = self.entries.pop() {
            if let Some(dispose) = &entry.hooks.dispose_async {
                dispose(entry.value.clone()).await;
            } else if let Some(dispose) = &entry.hooks.dispose {
                let result = catch_unwind(AssertUnwindSafe(|| dispose(&entry.value)));
                if result.is_err() {
                    warn!(key = %entry.key, "dispose hook panicked; continuing teardown");
                }
            }
        }
    }
}
