use super::catalog::ModelIdentifier;
use super::error::PredictionError;
use parking_lot::{Mutex, MutexGuard};
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const FILE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Serializes model construction.
///
/// The in-process mutex is always taken. When a lock file is configured, an
/// exclusive advisory lock on it is taken as well, so several server processes
/// sharing one model cache do not load the same weights at the same time. The
/// kernel drops that lock when the holding handle closes, including when the
/// holder dies, so the file itself stays on disk and carries no state. Both
/// acquisitions share one deadline.
pub struct ConstructionLock {
    local: Mutex<()>,
    file: Option<PathBuf>,
}

pub struct ConstructionGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: Option<LockFile>,
}

/// Holds the advisory lock until the handle is closed.
struct LockFile {
    _file: File,
}

impl ConstructionLock {
    pub fn in_process() -> Self {
        Self {
            local: Mutex::new(()),
            file: None,
        }
    }

    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            local: Mutex::new(()),
            file: Some(path.into()),
        }
    }

    pub fn acquire(
        &self,
        model: ModelIdentifier,
        timeout: Duration,
    ) -> Result<ConstructionGuard<'_>, PredictionError> {
        let deadline = Instant::now() + timeout;

        let local = self
            .local
            .try_lock_for(timeout)
            .ok_or(PredictionError::LockTimeout { model, timeout })?;

        let file = match &self.file {
            Some(path) => Some(Self::acquire_file(path, model, timeout, deadline)?),
            None => None,
        };

        Ok(ConstructionGuard {
            _local: local,
            _file: file,
        })
    }

    fn acquire_file(
        path: &Path,
        model: ModelIdentifier,
        timeout: Duration,
        deadline: Instant,
    ) -> Result<LockFile, PredictionError> {
        let lock_error = |source| PredictionError::LockFile {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_error)?;

        loop {
            match file.try_lock() {
                Ok(()) => return Ok(LockFile { _file: file }),
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PredictionError::LockTimeout { model, timeout });
                    }
                    std::thread::sleep(FILE_POLL_INTERVAL.min(deadline - now));
                }
                Err(TryLockError::Error(source)) => return Err(lock_error(source)),
            }
        }
    }
}

impl Default for ConstructionLock {
    fn default() -> Self {
        Self::in_process()
    }
}
