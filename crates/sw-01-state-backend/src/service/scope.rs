use crate::domain::config::StateBackendConfig;
use crate::domain::errors::StateResult;
use crate::service::handle::StateBackendHandle;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Owning scope of a job's state backend.
///
/// The job's execution context creates one scope and hands processors clones
/// of the handle. Whether the job succeeds (`finish`) or unwinds (`Drop`), the
/// handle is closed exactly once from here.
pub struct JobStateScope {
    handle: Arc<StateBackendHandle>,
    finished: bool,
}

impl JobStateScope {
    pub fn new(handle: StateBackendHandle) -> Self {
        Self {
            handle: Arc::new(handle),
            finished: false,
        }
    }

    /// Initialize a handle under `base_dir` and open its engine.
    pub fn open(config: StateBackendConfig, base_dir: impl AsRef<Path>) -> StateResult<Self> {
        let handle = StateBackendHandle::initialize(config, base_dir)?;
        handle.open()?;
        Ok(Self::new(handle))
    }

    pub fn handle(&self) -> Arc<StateBackendHandle> {
        Arc::clone(&self.handle)
    }

    /// Close the handle and report the outcome.
    pub fn finish(mut self) -> StateResult<()> {
        self.finished = true;
        self.handle.close()
    }
}

impl Drop for JobStateScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.handle.close() {
            warn!(
                directory = %self.handle.directory().display(),
                error = %e,
                "[sw-01] Failed to close state backend for aborted job"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finish_closes_handle() {
        let temp_dir = TempDir::new().unwrap();
        let scope = JobStateScope::open(StateBackendConfig::for_testing(), temp_dir.path()).unwrap();
        let handle = scope.handle();
        let dir = handle.directory().to_path_buf();

        scope.finish().unwrap();

        assert!(handle.is_closed());
        assert!(!dir.exists());
    }

    #[test]
    fn test_drop_closes_handle_on_abort() {
        let temp_dir = TempDir::new().unwrap();
        let handle = {
            let scope =
                JobStateScope::open(StateBackendConfig::for_testing(), temp_dir.path()).unwrap();
            let handle = scope.handle();
            let _map = handle.get_prefix_map::<u32, u32>().unwrap();
            handle
        };

        assert!(handle.is_closed());
        assert!(handle.live_partitions().is_empty());
        assert!(!handle.directory().exists());
    }
}
