// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Parallel renames over independent sources.
//!
//! Every job gets its own pipeline run; the only shared state is the
//! read-only [`Pipeline`] (options, project index, cancellation flag).
//! Results come back in job order regardless of completion order.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{RenameError, RenameResult};
use crate::pipeline::{Pipeline, RenameOutcome};
use crate::plan::DeclarationLocator;

/// One rename request.
#[derive(Debug, Clone)]
pub struct RenameJob {
    /// Caller's name for the source, usually its path.
    pub label: String,
    pub source: String,
    pub locator: DeclarationLocator,
    pub new_name: String,
}

impl RenameJob {
    pub fn new(
        label: impl Into<String>,
        source: impl Into<String>,
        locator: DeclarationLocator,
        new_name: impl Into<String>,
    ) -> Self {
        RenameJob {
            label: label.into(),
            source: source.into(),
            locator,
            new_name: new_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub label: String,
    pub result: RenameResult<RenameOutcome>,
}

impl JobOutcome {
    /// The declaration was not in this source.
    pub fn is_not_found(&self) -> bool {
        matches!(self.result, Err(RenameError::DeclarationNotFound { .. }))
    }

    /// Renamed, and the text actually changed.
    pub fn changed(&self, job: &RenameJob) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.text != job.source)
    }
}

/// Run every job through `pipeline` on the rayon pool.
pub fn rename_batch(jobs: &[RenameJob], pipeline: &Pipeline<'_>) -> Vec<JobOutcome> {
    let outcomes: Vec<JobOutcome> = jobs
        .par_iter()
        .map(|job| JobOutcome {
            label: job.label.clone(),
            result: pipeline.run(&job.source, &job.locator, &job.new_name),
        })
        .collect();

    debug!(
        jobs = jobs.len(),
        renamed = outcomes.iter().filter(|o| o.result.is_ok()).count(),
        "batch finished"
    );
    outcomes
}
