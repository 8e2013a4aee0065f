// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::{BoxId, Hit, RequestId, ResponseOutcome, SearchBox, SettleOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewTab {
    Item,
    Catalog,
    Properties,
}

impl ViewTab {
    pub const ALL: [Self; 3] = [Self::Item, Self::Catalog, Self::Properties];

    pub const fn title(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Catalog => "catalog",
            Self::Properties => "properties",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    EditTerms {
        box_id: BoxId,
        terms: String,
    },
    Settle {
        box_id: BoxId,
    },
    ApplyLookup {
        box_id: BoxId,
        request: RequestId,
        outcome: Result<Vec<Hit>, String>,
    },
    PickHit {
        box_id: BoxId,
        index: usize,
    },
    RemoveDepicts {
        index: usize,
    },
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    TabChanged(ViewTab),
    TermsEdited { box_id: BoxId },
    DuplicateTermsSkipped { box_id: BoxId },
    HitsCleared { box_id: BoxId },
    LookupDispatched {
        box_id: BoxId,
        request: RequestId,
        terms: String,
    },
    HitsReplaced { box_id: BoxId, count: usize },
    LookupFailed { box_id: BoxId, message: String },
    StaleLookupDiscarded { box_id: BoxId, request: RequestId },
    DepictsAdded { hit: Hit },
    DepictsRemoved { hit: Hit },
    StatusUpdated(String),
    StatusCleared,
}

/// Root view-model state. One [`SearchBox`] per active box id, created on
/// first use; the item view and each catalog entry get their own.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub active_tab: ViewTab,
    pub boxes: BTreeMap<BoxId, SearchBox>,
    pub new_depicts: Vec<Hit>,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            active_tab: ViewTab::Item,
            boxes: BTreeMap::new(),
            new_depicts: Vec::new(),
            status_line: None,
        }
    }
}

impl AppState {
    pub fn search_box(&self, box_id: &BoxId) -> Option<&SearchBox> {
        self.boxes.get(box_id)
    }

    fn box_mut(&mut self, box_id: &BoxId) -> &mut SearchBox {
        self.boxes.entry(box_id.clone()).or_default()
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::EditTerms { box_id, terms } => {
                self.box_mut(&box_id).edit(terms);
                vec![AppEvent::TermsEdited { box_id }]
            }
            AppCommand::Settle { box_id } => {
                let outcome = self.box_mut(&box_id).settle();
                match outcome {
                    SettleOutcome::Unchanged => {
                        vec![AppEvent::DuplicateTermsSkipped { box_id }]
                    }
                    SettleOutcome::Cleared => vec![AppEvent::HitsCleared { box_id }],
                    SettleOutcome::Dispatch { request, terms } => {
                        vec![AppEvent::LookupDispatched {
                            box_id,
                            request,
                            terms,
                        }]
                    }
                }
            }
            AppCommand::ApplyLookup {
                box_id,
                request,
                outcome,
            } => {
                let applied = self.box_mut(&box_id).apply_response(request, outcome);
                match applied {
                    ResponseOutcome::Stale => {
                        vec![AppEvent::StaleLookupDiscarded { box_id, request }]
                    }
                    ResponseOutcome::Replaced { count } => {
                        vec![AppEvent::HitsReplaced { box_id, count }]
                    }
                    ResponseOutcome::Failed { message } => {
                        vec![AppEvent::LookupFailed { box_id, message }]
                    }
                }
            }
            AppCommand::PickHit { box_id, index } => {
                let Some(hit) = self.box_mut(&box_id).take_hit(index) else {
                    return Vec::new();
                };
                self.new_depicts.push(hit.clone());
                vec![AppEvent::DepictsAdded { hit }]
            }
            AppCommand::RemoveDepicts { index } => {
                if index >= self.new_depicts.len() {
                    return Vec::new();
                }
                let hit = self.new_depicts.remove(index);
                vec![AppEvent::DepictsRemoved { hit }]
            }
            AppCommand::SetStatus(message) => {
                vec![self.set_status(&message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = ViewTab::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
