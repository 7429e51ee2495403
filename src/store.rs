use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{Target, TargetState};
use crate::utils::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    states: BTreeMap<String, TargetState>,
}

/// Configured targets plus the observed state of each, keyed by URL.
#[derive(Debug, Clone)]
pub struct TargetStore {
    targets: Vec<Target>,
    states: HashMap<String, TargetState>,
    state_file: Option<PathBuf>,
}

impl TargetStore {
    /// In-memory store; state lives only as long as the process.
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            states: HashMap::new(),
            state_file: None,
        }
    }

    /// Store backed by a JSON state file. A missing file starts empty; entries
    /// for URLs that are no longer configured are dropped.
    pub fn with_state_file(targets: Vec<Target>, path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let mut store = Self::new(targets);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: StateFile = serde_json::from_str(&content)?;
            let loaded = file.states.len();
            store.states = file
                .states
                .into_iter()
                .filter(|(url, _)| store.targets.iter().any(|t| &t.url == url))
                .collect();
            info!(
                "Loaded state for {} of {} saved targets from {}",
                store.states.len(),
                loaded,
                path.display()
            );
        }

        store.state_file = Some(path);
        Ok(store)
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn state(&self, url: &str) -> Option<&TargetState> {
        self.states.get(url)
    }

    /// Current state for `url`, or a fresh one if the target was never observed.
    pub fn snapshot(&self, url: &str) -> TargetState {
        self.states.get(url).cloned().unwrap_or_default()
    }

    pub(crate) fn state_mut(&mut self, url: &str) -> &mut TargetState {
        self.states.entry(url.to_string()).or_default()
    }

    /// Replaces the target list. States of URLs that remain configured are kept.
    pub fn reload(&mut self, targets: Vec<Target>) {
        self.states
            .retain(|url, _| targets.iter().any(|t| &t.url == url));
        debug!("Target list reloaded: {} targets", targets.len());
        self.targets = targets;
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    /// Writes the state file, if any, via a temporary file and rename.
    pub fn save(&self) -> Result<(), AppError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };

        let file = StateFile {
            states: self
                .states
                .iter()
                .map(|(url, state)| (url.clone(), state.clone()))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            warn!("Failed to replace state file {}: {}", path.display(), e);
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!("Saved state for {} targets to {}", self.states.len(), path.display());
        Ok(())
    }
}
