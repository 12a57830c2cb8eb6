use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Events sent from the file watcher to the TUI event loop.
#[derive(Debug)]
pub enum FileEvent {
    /// The tree file or the config changed on disk.
    Changed(Vec<PathBuf>),
}

/// Watches a workspace for external edits to its tree and config files.
pub struct TreeWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl TreeWatcher {
    /// Start watching `watched` files inside `root`.
    /// Call `poll()` each tick.
    pub fn start(root: &Path, watched: Vec<PathBuf>) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_watched(p, &watched))
                    .collect();
                if !relevant.is_empty() {
                    let _ = tx.send(FileEvent::Changed(relevant));
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::NonRecursive)?;
        Ok(TreeWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending file events.
    pub fn poll(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

/// Match by file name: notify may report canonicalized paths.
fn is_watched(path: &Path, watched: &[PathBuf]) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    watched.iter().any(|w| w.file_name() == Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_watched_by_file_name() {
        let watched = vec![PathBuf::from("/work/tree.json"), PathBuf::from("/work/treegrid.toml")];
        assert!(is_watched(Path::new("/private/work/tree.json"), &watched));
        assert!(!is_watched(Path::new("/work/.treegrid-state.json"), &watched));
        assert!(!is_watched(Path::new("/"), &watched));
    }
}
