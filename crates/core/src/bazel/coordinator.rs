//! Off-thread extraction with completions delivered on the caller's thread
//!
//! Each request runs on its own worker thread. Workers never touch shared
//! state: they send their result over a channel, and the owning thread
//! applies it in [`ExtractionCoordinator::pump`] or
//! [`ExtractionCoordinator::wait_idle`].
//!
//! Requests are neither queued nor cancelled: a request made while others
//! are outstanding starts immediately, so several extractions may run at the
//! same time against the shared extractor. Newer requests supersede older
//! ones only through the cache: whichever completion is applied last
//! replaces the cached rule list wholesale. A slower, older request can
//! therefore overwrite a newer one that finished first.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use tracing::{debug, warn};

use super::extractor::ProjectInfoExtractor;
use super::query::BuildTool;
use crate::error::{Error, Result};
use crate::types::RuleInfo;

pub type RequestId = u64;

type CompletionCallback = Box<dyn FnOnce(RequestId, std::result::Result<&[RuleInfo], &Error>)>;

/// Count of outstanding operations, shared between threads
#[derive(Debug, Clone, Default)]
pub struct InFlightCounter(Arc<AtomicUsize>);

impl InFlightCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation; it stays counted until the guard is dropped
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(Arc::clone(&self.0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }
}

/// Decrements its counter exactly once, on drop
#[derive(Debug)]
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

struct Completion {
    id: RequestId,
    result: Result<Vec<RuleInfo>>,
    // Released only after the result has been applied on the owning thread
    _guard: InFlightGuard,
}

/// Runs extractions in the background and owns the resulting rule cache
pub struct ExtractionCoordinator<T: BuildTool + 'static> {
    extractor: Arc<ProjectInfoExtractor<T>>,
    in_flight: InFlightCounter,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    next_id: RequestId,
    callbacks: HashMap<RequestId, CompletionCallback>,
    rule_infos: Vec<RuleInfo>,
    last_applied: Option<RequestId>,
}

impl<T: BuildTool + 'static> ExtractionCoordinator<T> {
    pub fn new(extractor: ProjectInfoExtractor<T>) -> Self {
        Self::with_counter(extractor, InFlightCounter::new())
    }

    /// Share a counter with other work (e.g. generation) tracked by the caller
    pub fn with_counter(extractor: ProjectInfoExtractor<T>, in_flight: InFlightCounter) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            extractor: Arc::new(extractor),
            in_flight,
            sender,
            receiver,
            next_id: 1,
            callbacks: HashMap::new(),
            rule_infos: Vec::new(),
            last_applied: None,
        }
    }

    pub fn in_flight(&self) -> &InFlightCounter {
        &self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_idle()
    }

    /// Rules from the most recently applied successful extraction
    pub fn rule_infos(&self) -> &[RuleInfo] {
        &self.rule_infos
    }

    pub fn last_applied(&self) -> Option<RequestId> {
        self.last_applied
    }

    /// Start an extraction on a worker thread
    ///
    /// Runs alongside any extraction still in flight.
    ///
    /// `on_complete` runs on the thread that later calls `pump` or
    /// `wait_idle`, after the rule cache has been updated.
    pub fn request_extraction<F>(&mut self, on_complete: F) -> Result<RequestId>
    where
        F: FnOnce(RequestId, std::result::Result<&[RuleInfo], &Error>) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let guard = self.in_flight.enter();
        let extractor = Arc::clone(&self.extractor);
        let sender = self.sender.clone();

        thread::Builder::new()
            .name(format!("projgen-extract-{id}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract_target_rules()))
                    .unwrap_or_else(|_| Err(Error::Other(format!("extraction worker {id} panicked"))));
                // The receiver lives as long as the coordinator; if it is gone
                // nobody is waiting for this result.
                let _ = sender.send(Completion {
                    id,
                    result,
                    _guard: guard,
                });
            })?;

        self.callbacks.insert(id, Box::new(on_complete));
        debug!("Started extraction request {}", id);
        Ok(id)
    }

    /// Apply every completion that has already arrived, without blocking
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => {
                    self.apply(completion);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return applied,
            }
        }
    }

    /// Block until every outstanding request has completed and been applied
    pub fn wait_idle(&mut self) {
        while !self.callbacks.is_empty() {
            match self.receiver.recv() {
                Ok(completion) => self.apply(completion),
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, completion: Completion) {
        let Completion { id, result, _guard } = completion;

        match &result {
            Ok(rules) => {
                debug!("Applying extraction {} ({} rules)", id, rules.len());
                self.rule_infos = rules.clone();
                self.last_applied = Some(id);
            }
            Err(e) => warn!("Extraction {} failed: {}", id, e),
        }

        if let Some(callback) = self.callbacks.remove(&id) {
            callback(id, result.as_deref());
        }
    }
}
