use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::{AnimationConfig, AnimationConfigPatch, EngineSettings};
use crate::error::CadenceResult;

/// Watches a settings file and sends the animation section as a patch
/// whenever it changes on disk.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ConfigWatcher {
    /// `current` is the animation config already in effect; only changes
    /// relative to it are sent.
    pub fn new(
        path: impl AsRef<Path>,
        current: AnimationConfig,
        patch_tx: mpsc::UnboundedSender<AnimationConfigPatch>,
    ) -> CadenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path.file_name().map(|name| name.to_os_string());

        // Watch the directory: editors often replace the file instead of
        // writing in place, which drops a watch on the file itself.
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let watch_path = path.clone();
        let mut last = current;
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        log::warn!("config watch error: {}", e);
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if !touches_file {
                    return;
                }

                match reload_patch(&watch_path, &mut last) {
                    Ok(Some(patch)) => {
                        log::info!("reloaded animation config from {}", watch_path.display());
                        // Receiver gone means the app is shutting down.
                        let _ = patch_tx.send(patch);
                    }
                    Ok(None) => {}
                    Err(e) => log::warn!("keeping previous config: {}", e),
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        log::debug!("watching {} for config changes", path.display());

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Re-read `path` and return a patch if its animation section differs from
/// `last`, which is then updated.
pub(crate) fn reload_patch(
    path: &Path,
    last: &mut AnimationConfig,
) -> CadenceResult<Option<AnimationConfigPatch>> {
    let settings = EngineSettings::load(path)?;
    if settings.animation == *last {
        return Ok(None);
    }
    *last = settings.animation.clone();
    Ok(Some(AnimationConfigPatch::from(settings.animation)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_unchanged_file_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        EngineSettings::default().save(&path).unwrap();

        let mut last = AnimationConfig::default();
        assert_eq!(reload_patch(&path, &mut last).unwrap(), None);
    }

    #[test]
    fn test_reload_changed_frame_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        let mut settings = EngineSettings::default();
        settings.animation.frame_rate = 24.0;
        settings.save(&path).unwrap();

        let mut last = AnimationConfig::default();
        let patch = reload_patch(&path, &mut last).unwrap().unwrap();
        assert_eq!(patch.frame_rate, Some(24.0));
        assert_eq!(last.frame_rate, 24.0);

        // Second read of the same content is a no-op.
        assert_eq!(reload_patch(&path, &mut last).unwrap(), None);
    }

    #[test]
    fn test_reload_invalid_file_keeps_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut last = AnimationConfig::default();
        assert!(reload_patch(&path, &mut last).is_err());
        assert_eq!(last, AnimationConfig::default());
    }

    #[tokio::test]
    async fn test_watcher_starts_on_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        EngineSettings::default().save(&path).unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let watcher = ConfigWatcher::new(&path, AnimationConfig::default(), tx).unwrap();
        assert_eq!(watcher.path(), path.as_path());
    }
}
