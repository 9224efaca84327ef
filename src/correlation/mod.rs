// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Correlation context propagation.
//!
//! Every task or hook execution is wrapped in [`with_unit_of_work`]. Code
//! running underneath can then ask for the ambient correlation id or derive
//! parent/root links without the ids being threaded through signatures.
//!
//! ```rust,ignore
//! use livetrace::correlation::{current_unit_links, derive_parent_and_root, with_unit_of_work};
//!
//! let links = derive_parent_and_root("task.sendEmail");
//! with_unit_of_work("task.sendEmail", async {
//!     // Same links, seen from inside the unit.
//!     let inside = current_unit_links();
//! })
//! .await;
//! ```

mod context;
mod id;

pub use context::{
    current_context, current_correlation_id, current_unit_links, derive_parent_and_root,
    propagate, sync_unit_of_work, with_correlation, with_unit_of_work, CorrelationContext,
    UnitLinks,
};
pub use id::CorrelationId;
