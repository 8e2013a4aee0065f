// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key naming one search box. The item view uses a single well-known key;
/// the catalog view allocates one per catalog entry (the entry's QID).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoxId(String);

impl BoxId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BoxId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic lookup sequence number. A response is applied only if its id
/// matches the box's live request; anything older is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSequence {
    last: u64,
}

impl RequestSequence {
    pub fn advance(&mut self) -> RequestId {
        self.last += 1;
        RequestId::new(self.last)
    }

    pub const fn last_issued(&self) -> Option<RequestId> {
        if self.last == 0 {
            None
        } else {
            Some(RequestId::new(self.last))
        }
    }
}
