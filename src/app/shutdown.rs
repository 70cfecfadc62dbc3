//! Early termination of a run.
//!
//! A run normally ends after its target round count. The [`ShutdownManager`]
//! lets Ctrl+C (or a test) cut it short; the driver polls it between commits.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;

/// Shared "stop now" flag plus the exit code the binary should report.
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    shutdown_requested: Arc<AtomicBool>,
    exit_code: Arc<AtomicI32>,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            exit_code: Arc::new(AtomicI32::new(0)),
        }
    }

    /// Requests shutdown.
    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::SeqCst) {
            tracing::info!("Shutdown requested");
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Requests shutdown on the first Ctrl+C. The listener runs on its own
    /// thread with a single-threaded runtime so it never competes with the
    /// simulation's workers.
    pub fn install_ctrl_c_handler(&self) -> Result<()> {
        let manager = self.clone();
        thread::Builder::new()
            .name("habitat-signal".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
                        return;
                    }
                };
                match runtime.block_on(tokio::signal::ctrl_c()) {
                    Ok(()) => {
                        manager.set_exit_code(130);
                        manager.request_shutdown();
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C"),
                }
            })
            .context("Failed to spawn signal thread")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_manager_new() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_shutdown_requested());
        assert_eq!(manager.exit_code(), 0);
    }

    #[test]
    fn test_shutdown_request_is_shared_between_clones() {
        let manager = ShutdownManager::new();
        let observer = manager.clone();
        manager.request_shutdown();
        manager.request_shutdown();
        assert!(observer.is_shutdown_requested());
    }

    #[test]
    fn test_exit_code() {
        let manager = ShutdownManager::new();
        manager.set_exit_code(1);
        assert_eq!(manager.clone().exit_code(), 1);
    }
}
