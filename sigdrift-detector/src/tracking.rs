//! Per-document tracking state machine
//!
//! A [`TrackingState`] is either **Idle** (nothing captured) or **Tracking** (the
//! original form of one declaration is captured and signature observations are
//! buffered). Observations are only folded into a descriptor when a consumer asks
//! for it via [`TrackingState::resolve`], so a burst of keystrokes costs one
//! string push each.
//!
//! ## Transitions
//!
//! - Idle → Tracking: [`TrackingState::start`] on the first qualifying edit
//! - Tracking → Tracking: [`TrackingState::extend`] on every structural edit
//! - Tracking → Idle: [`TrackingState::reinit`], or during `resolve` when an
//!   observation reverts to the original form or cannot be merged

use crate::descriptor::ChangeDescriptor;
use crate::extractor::SignatureExtractor;
use crate::types::{DeclarationRef, Timestamp};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

/// Buffer of raw signature observations waiting to be resolved
///
/// Cloning yields another handle to the same buffer. Outside the crate a handle
/// is read-only: observations only leave the buffer through
/// [`TrackingState::resolve`], which folds them into the running descriptor.
#[derive(Debug, Clone, Default)]
pub struct PendingObservations {
    inner: Arc<Mutex<Vec<String>>>,
}

impl PendingObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation unless it repeats the last one
    ///
    /// Returns true if the observation was enqueued.
    pub(crate) fn push(&self, observation: String) -> bool {
        let mut buffer = self.inner.lock();
        if buffer.last() == Some(&observation) {
            return false;
        }
        buffer.push(observation);
        true
    }

    /// Take every buffered observation in insertion order, leaving the buffer empty
    pub(crate) fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub(crate) fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy of the buffered observations, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().clone()
    }
}

/// Everything captured when tracking starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Raw text of the declaration's full range
    pub original_text: String,
    /// Signature text of the declaration as the extractor renders it
    pub original_signature: String,
    /// Declared name, if the declaration exposes one
    pub original_name: Option<String>,
    /// Initial descriptor built by the extractor
    pub initial: ChangeDescriptor,
}

#[derive(Debug, Clone)]
struct Tracked {
    capture: Capture,
    current: ChangeDescriptor,
    started_at: Timestamp,
}

/// Why a resolve pass ended tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolveStop {
    Reverted,
    Unreconcilable,
}

/// Tracking state machine for one open document
#[derive(Debug, Default)]
pub struct TrackingState {
    tracked: Option<Tracked>,
    pending: PendingObservations,
}

impl TrackingState {
    /// Create an idle tracking state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracked.is_some()
    }

    /// Enter Tracking with a freshly captured declaration
    ///
    /// Ignored while already tracking: the original form is captured once.
    pub fn start(&mut self, capture: Capture) -> bool {
        if self.tracked.is_some() {
            return false;
        }

        log::debug!(
            "Tracking started for {} (original: {:?})",
            capture.initial.declaration,
            capture.original_text
        );
        self.pending.clear();
        self.tracked = Some(Tracked {
            current: capture.initial.clone(),
            capture,
            started_at: Utc::now(),
        });
        true
    }

    /// Buffer one observed signature text
    ///
    /// Returns true if the observation was enqueued (tracking is active and the
    /// text differs from the last buffered one).
    pub fn extend(&self, observation: String) -> bool {
        if self.tracked.is_none() {
            return false;
        }
        let enqueued = self.pending.push(observation);
        if enqueued {
            log::trace!("Buffered observation ({} pending)", self.pending.len());
        }
        enqueued
    }

    /// Fold every pending observation into the running descriptor
    ///
    /// Returns the resolved descriptor, or `None` if tracking is inactive, ended
    /// during this pass, or the current form does not differ from the original.
    /// A rename-only descriptor is always returned.
    pub fn resolve(&mut self, extractor: &dyn SignatureExtractor) -> Option<ChangeDescriptor> {
        let observations = self.pending.drain();
        let tracked = self.tracked.as_mut()?;

        let mut stop = None;
        for observation in &observations {
            if observation == &tracked.capture.original_signature
                || observation == &tracked.capture.original_text
            {
                stop = Some(ResolveStop::Reverted);
                break;
            }
            match extractor.merge_observation(
                observation,
                &tracked.current,
                tracked.capture.original_name.as_deref(),
            ) {
                Some(next) => tracked.current = next,
                None => {
                    stop = Some(ResolveStop::Unreconcilable);
                    break;
                }
            }
        }

        match stop {
            Some(ResolveStop::Reverted) => {
                log::debug!("Signature of {} reverted to original", tracked.current.declaration);
                self.reinit();
                None
            }
            Some(ResolveStop::Unreconcilable) => {
                log::debug!(
                    "Observation could not be merged into {}, resetting",
                    tracked.current.declaration
                );
                self.reinit();
                None
            }
            None if tracked.current.has_changes() => Some(tracked.current.clone()),
            None => None,
        }
    }

    /// Reset to Idle, dropping the capture and every pending observation
    pub fn reinit(&mut self) {
        if let Some(tracked) = self.tracked.take() {
            log::debug!("Tracking reset for {}", tracked.current.declaration);
        }
        self.pending.clear();
    }

    /// Descriptor captured when tracking began
    pub fn initial(&self) -> Option<&ChangeDescriptor> {
        self.tracked.as_ref().map(|t| &t.capture.initial)
    }

    /// Most recently resolved descriptor (not including pending observations)
    pub fn current(&self) -> Option<&ChangeDescriptor> {
        self.tracked.as_ref().map(|t| &t.current)
    }

    pub fn original_text(&self) -> Option<&str> {
        self.tracked.as_ref().map(|t| t.capture.original_text.as_str())
    }

    pub fn original_signature(&self) -> Option<&str> {
        self.tracked
            .as_ref()
            .map(|t| t.capture.original_signature.as_str())
    }

    pub fn original_name(&self) -> Option<&str> {
        self.tracked
            .as_ref()
            .and_then(|t| t.capture.original_name.as_deref())
    }

    /// The tracked declaration
    pub fn declaration(&self) -> Option<&DeclarationRef> {
        self.initial().map(|initial| &initial.declaration)
    }

    /// When tracking started
    pub fn started_at(&self) -> Option<Timestamp> {
        self.tracked.as_ref().map(|t| t.started_at)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Shared handle to the observation buffer
    pub fn pending(&self) -> PendingObservations {
        self.pending.clone()
    }
}
