//! Hot-reload of the trait configuration
//!
//! Watches the config file and reloads the engine when it changes:
//! - Uses `notify` for filesystem events, drained on the host thread by `poll`
//! - Parse and validation happen before anything is swapped
//! - The previous registry stays active when a reload fails
//! - Status is serializable for diagnostics

use anyhow::Context;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

use crate::config;
use crate::engine::{ReloadSummary, TraitEngine};

/// Hot-reload state tracking
#[derive(Debug, Clone, Default)]
pub struct HotReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    /// Unix seconds of the last reload attempt
    pub last_reload_time: f64,
    pub last_error: Option<String>,
}

/// Watches one config file and applies it to an engine on demand
pub struct TraitReloader {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    state: HotReloadState,
}

impl TraitReloader {
    /// Starts watching `path`'s directory (non-recursively)
    pub fn watch(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let (tx, rx) = channel();

        let mut watcher =
            notify::recommended_watcher(tx).context("failed to create file watcher")?;
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;

        info!(path = %path.display(), "hot-reload enabled");

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            state: HotReloadState {
                enabled: true,
                watched_file: Some(path),
                ..Default::default()
            },
        })
    }

    pub fn state(&self) -> &HotReloadState {
        &self.state
    }

    pub fn status(&self) -> HotReloadStatus {
        HotReloadStatus::from_state(&self.state)
    }

    /// Drains pending filesystem events; reloads once if the watched file changed.
    ///
    /// Returns `None` when nothing relevant happened.
    pub fn poll(&mut self, engine: &mut TraitEngine) -> Option<anyhow::Result<ReloadSummary>> {
        let mut changed = false;
        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(event) => {
                    changed |= is_config_modify_event(&event, &self.state.watched_file);
                }
                Err(e) => warn!("file watcher error: {}", e),
            }
        }
        changed.then(|| self.reload_now(engine))
    }

    /// Reloads immediately, recording the outcome in the status
    pub fn reload_now(&mut self, engine: &mut TraitEngine) -> anyhow::Result<ReloadSummary> {
        let result = self.try_reload(engine);
        self.state.last_reload_time = unix_seconds();
        match &result {
            Ok(summary) => {
                self.state.reload_count += 1;
                self.state.last_reload_success = true;
                self.state.last_error = None;
                info!(
                    reload_count = self.state.reload_count,
                    loaded = summary.loaded,
                    "config reloaded"
                );
            }
            Err(e) => {
                self.state.last_reload_success = false;
                self.state.last_error = Some(format!("{e:#}"));
                error!("config reload failed, keeping previous traits: {:#}", e);
            }
        }
        result
    }

    fn try_reload(&self, engine: &mut TraitEngine) -> anyhow::Result<ReloadSummary> {
        let path = self
            .state
            .watched_file
            .as_deref()
            .context("no config file is being watched")?;
        let config = config::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok(engine.reload(config)?)
    }
}

/// Check if event is a modification of the watched file
fn is_config_modify_event(event: &Event, watched_file: &Option<PathBuf>) -> bool {
    let Some(file_name) = watched_file.as_deref().and_then(Path::file_name) else {
        return false;
    };
    (event.kind.is_modify() || matches!(event.kind, notify::EventKind::Create(_)))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name))
}

fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Hot-reload status snapshot
#[derive(Debug, Serialize, Deserialize)]
pub struct HotReloadStatus {
    pub enabled: bool,
    pub watched_file: Option<String>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_reload_time: f64,
    pub last_error: Option<String>,
}

impl HotReloadStatus {
    pub fn from_state(state: &HotReloadState) -> Self {
        Self {
            enabled: state.enabled,
            watched_file: state.watched_file.as_ref().map(|p| p.display().to_string()),
            reload_count: state.reload_count,
            last_reload_success: state.last_reload_success,
            last_reload_time: state.last_reload_time,
            last_error: state.last_error.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraitConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn modify_event(path: &str) -> Event {
        Event {
            kind: notify::EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_config_modify_event() {
        let watched = Some(PathBuf::from("config/relic_traits.json"));
        assert!(is_config_modify_event(
            &modify_event("/abs/config/relic_traits.json"),
            &watched
        ));
        assert!(!is_config_modify_event(&modify_event("config/other.json"), &watched));
        assert!(!is_config_modify_event(&modify_event("config/relic_traits.json"), &None));
    }

    #[test]
    fn test_remove_event_ignored() {
        let watched = Some(PathBuf::from("relic_traits.json"));
        let event = Event {
            kind: notify::EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![PathBuf::from("relic_traits.json")],
            attrs: Default::default(),
        };
        assert!(!is_config_modify_event(&event, &watched));
    }

    #[test]
    fn test_hotreload_status_json() {
        let status = HotReloadStatus {
            enabled: true,
            watched_file: Some("config/relic_traits.json".to_string()),
            reload_count: 5,
            last_reload_success: true,
            last_reload_time: 123.456,
            last_error: None,
        };
        let json = status.to_json();
        assert!(json.contains("\"enabled\":true"));
        assert!(json.contains("\"reload_count\":5"));
        let restored = HotReloadStatus::from_json(&json).unwrap();
        assert_eq!(restored.reload_count, 5);
        assert!(restored.last_reload_success);
    }

    #[test]
    fn test_hotreload_state_default() {
        let state = HotReloadState::default();
        assert!(!state.enabled);
        assert_eq!(state.reload_count, 0);
        assert!(state.watched_file.is_none());
    }

    #[test]
    fn test_reload_now_applies_and_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("relic_traits.json");
        config::save(&path, &TraitConfig::default()).unwrap();

        let mut engine = TraitEngine::new(TraitConfig::default()).unwrap();
        let mut reloader = TraitReloader::watch(&path).unwrap();

        let mut next = TraitConfig::default();
        next.traits = vec![json!({ "id": "solo", "display_text": "Solo" })];
        config::save(&path, &next).unwrap();
        let summary = reloader.reload_now(&mut engine).unwrap();
        assert_eq!(summary.loaded, 1);
        assert_eq!(engine.registry().len(), 1);
        assert_eq!(reloader.status().reload_count, 1);

        std::fs::write(&path, "{ broken").unwrap();
        assert!(reloader.reload_now(&mut engine).is_err());
        assert_eq!(engine.registry().len(), 1);
        assert!(engine.registry().lookup("solo").is_some());
        let status = reloader.status();
        assert!(!status.last_reload_success);
        assert!(status.last_error.is_some());
        assert_eq!(status.reload_count, 1);
    }
}
