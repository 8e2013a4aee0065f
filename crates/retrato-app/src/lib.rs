// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod ids;
pub mod model;
pub mod search;
pub mod state;

pub use ids::*;
pub use model::*;
pub use search::*;
pub use state::*;
