//! File watching for `build --watch`.
//!
//! Watches the project root recursively and forwards relevant paths. The
//! build loop folds changes that arrive within the aggregate timeout into a
//! single rebuild.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{CliError, Result};

/// Decides which changed paths trigger a rebuild.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    output_dir: PathBuf,
    ignored: Vec<String>,
}

impl WatchFilter {
    /// `ignored` holds path fragments matched against the root-relative path.
    pub fn new(root: PathBuf, output_dir: PathBuf, ignored: Vec<String>) -> Self {
        Self {
            root,
            output_dir,
            ignored,
        }
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        // The build's own output would otherwise retrigger it.
        if path.starts_with(&self.output_dir) {
            return true;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return true;
        };

        let hidden_or_vendored = relative.components().any(|component| {
            component.as_os_str().to_str().is_some_and(|name| {
                name == "node_modules" || (name.starts_with('.') && name != "." && name != "..")
            })
        });
        if hidden_or_vendored {
            return true;
        }

        let relative = relative.to_string_lossy().replace('\\', "/");
        self.ignored
            .iter()
            .any(|fragment| !fragment.is_empty() && relative.contains(fragment.as_str()))
    }
}

/// Keeps the underlying watcher alive; dropping it stops notifications.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `filter`'s root.
    pub fn new(filter: WatchFilter) -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let root = filter.root.clone();
        if !root.is_dir() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                if !filter.should_ignore(&path) {
                    // The receiver is gone once the build loop exits.
                    let _ = tx.send(path);
                }
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Wait for the next change, then keep collecting until `aggregate` passes
/// without one. `None` once the channel is closed.
pub async fn next_batch(
    rx: &mut mpsc::UnboundedReceiver<PathBuf>,
    aggregate: Duration,
) -> Option<Vec<PathBuf>> {
    let mut batch = vec![rx.recv().await?];
    while let Ok(Some(path)) = tokio::time::timeout(aggregate, rx.recv()).await {
        if !batch.contains(&path) {
            batch.push(path);
        }
    }
    Some(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(ignored: &[&str]) -> WatchFilter {
        WatchFilter::new(
            PathBuf::from("/project"),
            PathBuf::from("/project/local/assets"),
            ignored.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_sources_trigger_rebuilds() {
        let filter = filter(&[]);
        assert!(!filter.should_ignore(Path::new("/project/src/app.js")));
        assert!(!filter.should_ignore(Path::new("/project/blocks/card/card.sass")));
    }

    #[test]
    fn test_output_and_vendor_are_ignored() {
        let filter = filter(&[]);
        assert!(filter.should_ignore(Path::new("/project/local/assets/local/app/app.js")));
        assert!(filter.should_ignore(Path::new("/project/node_modules/vue/index.js")));
        assert!(filter.should_ignore(Path::new("/project/.git/index")));
        assert!(filter.should_ignore(Path::new("/elsewhere/app.js")));
    }

    #[test]
    fn test_configured_fragments() {
        let filter = filter(&["public_html/build/", ".bak"]);
        assert!(filter.should_ignore(Path::new("/project/public_html/build/x.js")));
        assert!(filter.should_ignore(Path::new("/project/src/app.js.bak")));
        assert!(!filter.should_ignore(Path::new("/project/public_html/index.js")));
    }

    #[tokio::test]
    async fn test_changes_are_batched() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PathBuf::from("/project/a.js")).unwrap();
        tx.send(PathBuf::from("/project/b.js")).unwrap();
        tx.send(PathBuf::from("/project/a.js")).unwrap();

        let batch = next_batch(&mut rx, Duration::from_millis(20)).await.unwrap();
        assert_eq!(
            batch,
            [PathBuf::from("/project/a.js"), PathBuf::from("/project/b.js")]
        );

        drop(tx);
        assert!(next_batch(&mut rx, Duration::from_millis(20)).await.is_none());
    }
}
