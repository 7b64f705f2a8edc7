use crate::context::ValidationContext;
use crate::error::PolicyError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Reloads a context's policy file whenever it changes on disk. Watching
/// stops when the watcher is dropped.
pub struct PolicyWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl PolicyWatcher {
    /// Watch the policy file named in `context`'s configuration
    pub fn start(context: Arc<ValidationContext>) -> Result<Self, PolicyError> {
        let path = context
            .config()
            .policy_file
            .clone()
            .ok_or_else(|| PolicyError::Watch("no policy file configured".to_string()))?;
        info!("Starting policy file watcher for: {}", path.display());

        let watched = path.clone();
        let mut watcher: RecommendedWatcher = Watcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if is_relevant(&event, &watched) {
                        debug!("Policy file changed: {:?}", event.paths);
                        // Failures are logged by the context, which keeps
                        // its previous policy
                        if let Err(e) = context.reload_policy() {
                            error!("Failed to reload policy: {}", e);
                        }
                    }
                }
                Err(e) => error!("Policy file watch error: {}", e),
            },
            notify::Config::default(),
        )?;

        // Watch the directory; editors often replace the file rather than
        // writing it in place
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A create or modify event naming the policy file
fn is_relevant(event: &Event, path: &Path) -> bool {
    let file_name = path.file_name();
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p == path || (file_name.is_some() && p.file_name() == file_name))
}
