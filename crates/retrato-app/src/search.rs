// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Hit, RequestId, RequestSequence};

/// Queries shorter than this never reach the lookup endpoint; settling on
/// one clears the box's results instead.
pub const MIN_TERMS_CHARS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchPhase {
    #[default]
    Idle,
    Pending,
    Loaded,
    Failed(String),
}

/// What a settled value asks the shell to do. `Dispatch` is the only
/// variant that requires I/O; the shell runs the lookup and feeds the
/// outcome back through [`SearchBox::apply_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The value is unchanged from the last dispatched query.
    Unchanged,
    /// The value is below the minimum length; results were cleared.
    Cleared,
    Dispatch { request: RequestId, terms: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The response belongs to a superseded request and was discarded.
    Stale,
    Replaced { count: usize },
    Failed { message: String },
}

/// Query state for one search box.
///
/// `previous_terms` is the last value that actually produced a dispatched
/// lookup, not merely the last edit; the duplicate guard compares against
/// it when the quiet window elapses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchBox {
    terms: String,
    previous_terms: String,
    hits: Vec<Hit>,
    phase: SearchPhase,
    live_request: Option<RequestId>,
    sequence: RequestSequence,
}

impl SearchBox {
    pub fn terms(&self) -> &str {
        &self.terms
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn phase(&self) -> &SearchPhase {
        &self.phase
    }

    pub const fn live_request(&self) -> Option<RequestId> {
        self.live_request
    }

    /// Record the raw field value. Editing never performs I/O; the shell
    /// restarts the box's quiet-window deadline instead.
    pub fn edit(&mut self, terms: impl Into<String>) {
        self.terms = terms.into();
    }

    /// The quiet window elapsed with the current value.
    pub fn settle(&mut self) -> SettleOutcome {
        if self.terms == self.previous_terms {
            return SettleOutcome::Unchanged;
        }
        self.previous_terms = self.terms.clone();

        if self.terms.chars().count() < MIN_TERMS_CHARS {
            self.hits.clear();
            self.phase = SearchPhase::Idle;
            self.live_request = None;
            return SettleOutcome::Cleared;
        }

        let request = self.sequence.advance();
        self.live_request = Some(request);
        self.phase = SearchPhase::Pending;
        SettleOutcome::Dispatch {
            request,
            terms: self.terms.clone(),
        }
    }

    /// A lookup response arrived. Responses for anything but the live
    /// request are dropped so a late stale reply cannot overwrite newer
    /// results.
    pub fn apply_response(
        &mut self,
        request: RequestId,
        outcome: Result<Vec<Hit>, String>,
    ) -> ResponseOutcome {
        if self.live_request != Some(request) {
            return ResponseOutcome::Stale;
        }
        self.live_request = None;

        match outcome {
            Ok(hits) => {
                let count = hits.len();
                self.hits = hits;
                self.phase = SearchPhase::Loaded;
                ResponseOutcome::Replaced { count }
            }
            Err(message) => {
                self.hits.clear();
                self.phase = SearchPhase::Failed(message.clone());
                ResponseOutcome::Failed { message }
            }
        }
    }

    /// Pick the hit at `index` out of the current results. On success the
    /// result list and the field are cleared; `previous_terms` keeps the
    /// last dispatched value.
    pub fn take_hit(&mut self, index: usize) -> Option<Hit> {
        if index >= self.hits.len() {
            return None;
        }
        let hit = self.hits.remove(index);
        self.hits.clear();
        self.terms.clear();
        self.phase = SearchPhase::Idle;
        self.live_request = None;
        Some(hit)
    }
}
