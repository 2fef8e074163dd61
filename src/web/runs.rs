//! In-memory store of comic runs. Nothing here survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distr::{Alphanumeric, SampleString};
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants::{RUN_ID_LENGTH, RUN_TTL_MINUTES};
use crate::pipeline::{ComicSettings, RenderedComic, Storyboard};

/// One user's comic, from storyboard to finished page.
#[derive(Clone, Debug)]
pub(crate) struct ComicRun {
    pub(crate) id: String,
    pub(crate) created_at: DateTime<Utc>,
    /// Bumped on every render so cached downloads get revalidated.
    pub(crate) rendered_at: DateTime<Utc>,
    /// Key the run was started with, reused when rendering.
    pub(crate) api_key: String,
    pub(crate) settings: ComicSettings,
    pub(crate) storyboard: Storyboard,
    pub(crate) rendered: Option<RenderedComic>,
}

impl ComicRun {
    pub(crate) fn new(api_key: String, settings: ComicSettings, storyboard: Storyboard) -> Self {
        let now = Utc::now();
        Self {
            id: generate_run_id(),
            created_at: now,
            rendered_at: now,
            api_key,
            settings,
            storyboard,
            rendered: None,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::minutes(RUN_TTL_MINUTES)
    }
}

fn generate_run_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), RUN_ID_LENGTH)
}

/// Shared run store, cheap to clone.
#[derive(Clone, Debug, Default)]
pub(crate) struct RunStore {
    runs: Arc<RwLock<HashMap<String, ComicRun>>>,
}

impl RunStore {
    /// Stores a run, dropping any that have expired.
    pub(crate) async fn insert(&self, run: ComicRun) {
        let mut runs = self.runs.write().await;
        let now = Utc::now();
        let before = runs.len();
        runs.retain(|_, run| !run.is_expired(now));
        if runs.len() != before {
            debug!("Pruned {} expired run(s)", before - runs.len());
        }
        runs.insert(run.id.clone(), run);
    }

    /// Returns a copy of the run, if it exists and hasn't expired.
    pub(crate) async fn get(&self, id: &str) -> Option<ComicRun> {
        let runs = self.runs.read().await;
        runs.get(id)
            .filter(|run| !run.is_expired(Utc::now()))
            .cloned()
    }

    /// Replaces an existing run. Returns false if it's gone.
    pub(crate) async fn update(&self, run: ComicRun) -> bool {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.runs.read().await.len()
    }
}
