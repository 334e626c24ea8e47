//! `vitae start`: run the server in a child process and act on its exit code.
//!
//! | Child exit | Supervisor                          |
//! |------------|-------------------------------------|
//! | 0          | cleanup, exit 0                     |
//! | 2          | exit 0, artifacts kept              |
//! | 3          | spawn a fresh server                |
//! | other      | exit with the child's code (or 1)   |
//!
//! Ctrl+C marks the supervisor interrupted. The child receives the same
//! signal from the terminal and stops on its own; once it has exited an
//! interrupted supervisor cleans up exactly like code 0.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use crate::core::ExitMode;
use crate::workspace::Workspace;
use crate::{debug, log};

/// Runs one server process to completion.
pub trait ChildLauncher {
    /// Exit code of the child, `None` when it was killed by a signal.
    fn launch(&mut self) -> Result<Option<i32>>;
}

/// Removes generated artifacts after a clean stop.
pub trait Cleanup {
    fn cleanup(&mut self) -> Result<()>;
}

/// Restart loop over a [`ChildLauncher`].
pub struct Supervisor<L, C> {
    launcher: L,
    cleanup: C,
    interrupted: Arc<AtomicBool>,
}

impl<L: ChildLauncher, C: Cleanup> Supervisor<L, C> {
    pub fn new(launcher: L, cleanup: C) -> Self {
        Self {
            launcher,
            cleanup,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag set by the Ctrl+C handler.
    pub fn interrupted(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Run until the child asks for anything but a restart.
    ///
    /// Returns the supervisor's own exit code.
    pub fn run(mut self) -> Result<i32> {
        loop {
            let code = self.launcher.launch()?;

            if self.interrupted.load(Ordering::SeqCst) {
                debug!("start"; "interrupted, child exited with {:?}", code);
                return Ok(self.finish());
            }

            match code.and_then(ExitMode::from_code) {
                Some(ExitMode::Stop) => return Ok(self.finish()),
                Some(ExitMode::Fast) => {
                    debug!("start"; "fast stop, keeping generated files");
                    return Ok(0);
                }
                Some(ExitMode::Restart) => {
                    log!("start"; "restarting server");
                }
                Some(ExitMode::Error) => return Ok(ExitMode::Error.code()),
                None => {
                    let code = code.unwrap_or(ExitMode::Error.code());
                    log!("start"; "server exited unexpectedly ({})", code);
                    return Ok(code);
                }
            }
        }
    }

    fn finish(&mut self) -> i32 {
        match self.cleanup.cleanup() {
            Ok(()) => 0,
            Err(e) => {
                log!("clean"; "failed: {:#}", e);
                ExitMode::Error.code()
            }
        }
    }
}

// ============================================================================
// Process-backed implementations
// ============================================================================

/// Re-executes this binary as `vitae serve` with inherited stdio.
pub struct ServeProcess {
    exe: PathBuf,
    args: Vec<OsString>,
}

impl ServeProcess {
    pub fn new(args: Vec<OsString>) -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate the vitae executable")?;
        Ok(Self { exe, args })
    }
}

impl ChildLauncher for ServeProcess {
    fn launch(&mut self) -> Result<Option<i32>> {
        debug!("start"; "{} {:?}", self.exe.display(), self.args);
        let status = Command::new(&self.exe)
            .args(&self.args)
            .status()
            .with_context(|| format!("Failed to start {}", self.exe.display()))?;
        Ok(exit_code(&status))
    }
}

fn exit_code(status: &ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            debug!("start"; "server killed by signal {}", signal);
        }
    }
    status.code()
}

/// Cleanup of every known document tree and the runtime cache.
pub struct WorkspaceCleanup {
    workspace: Workspace,
}

impl WorkspaceCleanup {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

impl Cleanup for WorkspaceCleanup {
    fn cleanup(&mut self) -> Result<()> {
        super::clean::clean_workspace(&self.workspace).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays exit codes; optionally raises the interrupt flag on a launch.
    struct Scripted {
        codes: VecDeque<Option<i32>>,
        launches: usize,
        interrupt_on: Option<(usize, Arc<AtomicBool>)>,
    }

    impl Scripted {
        fn new(codes: &[Option<i32>]) -> Self {
            Self {
                codes: codes.iter().copied().collect(),
                launches: 0,
                interrupt_on: None,
            }
        }
    }

    impl ChildLauncher for &mut Scripted {
        fn launch(&mut self) -> Result<Option<i32>> {
            self.launches += 1;
            if let Some((n, flag)) = &self.interrupt_on
                && *n == self.launches
            {
                flag.store(true, Ordering::SeqCst);
            }
            self.codes
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no more scripted children"))
        }
    }

    #[derive(Default)]
    struct Counting {
        runs: usize,
        fail: bool,
    }

    impl Cleanup for &mut Counting {
        fn cleanup(&mut self) -> Result<()> {
            self.runs += 1;
            if self.fail {
                anyhow::bail!("disk on fire");
            }
            Ok(())
        }
    }

    fn run(launcher: &mut Scripted, cleanup: &mut Counting) -> i32 {
        Supervisor::new(launcher, cleanup).run().unwrap()
    }

    #[test]
    fn test_stop_cleans_once() {
        let (mut launcher, mut cleanup) = (Scripted::new(&[Some(0)]), Counting::default());
        assert_eq!(run(&mut launcher, &mut cleanup), 0);
        assert_eq!(launcher.launches, 1);
        assert_eq!(cleanup.runs, 1);
    }

    #[test]
    fn test_restart_respawns_without_cleanup() {
        let mut launcher = Scripted::new(&[Some(3), Some(0)]);
        let mut cleanup = Counting::default();
        assert_eq!(run(&mut launcher, &mut cleanup), 0);
        assert_eq!(launcher.launches, 2);
        assert_eq!(cleanup.runs, 1);
    }

    #[test]
    fn test_restart_then_fast() {
        let mut launcher = Scripted::new(&[Some(3), Some(2)]);
        let mut cleanup = Counting::default();
        assert_eq!(run(&mut launcher, &mut cleanup), 0);
        assert_eq!(launcher.launches, 2);
        assert_eq!(cleanup.runs, 0);
    }

    #[test]
    fn test_fast_skips_cleanup() {
        let (mut launcher, mut cleanup) = (Scripted::new(&[Some(2)]), Counting::default());
        assert_eq!(run(&mut launcher, &mut cleanup), 0);
        assert_eq!(cleanup.runs, 0);
    }

    #[test]
    fn test_errors_propagate_code() {
        let (mut launcher, mut cleanup) = (Scripted::new(&[Some(1)]), Counting::default());
        assert_eq!(run(&mut launcher, &mut cleanup), 1);

        let (mut launcher, mut cleanup) = (Scripted::new(&[Some(42)]), Counting::default());
        assert_eq!(run(&mut launcher, &mut cleanup), 42);

        let (mut launcher, mut cleanup) = (Scripted::new(&[None]), Counting::default());
        assert_eq!(run(&mut launcher, &mut cleanup), 1);
        assert_eq!(cleanup.runs, 0);
    }

    #[test]
    fn test_interrupt_cleans_instead_of_restarting() {
        let mut launcher = Scripted::new(&[Some(3), Some(3)]);
        let mut cleanup = Counting::default();

        let flag = Arc::new(AtomicBool::new(false));
        launcher.interrupt_on = Some((1, Arc::clone(&flag)));

        let mut supervisor = Supervisor::new(&mut launcher, &mut cleanup);
        supervisor.interrupted = flag;
        assert_eq!(supervisor.run().unwrap(), 0);

        assert_eq!(launcher.launches, 1);
        assert_eq!(cleanup.runs, 1);
    }

    #[test]
    fn test_cleanup_failure_is_error() {
        let mut launcher = Scripted::new(&[Some(0)]);
        let mut cleanup = Counting {
            fail: true,
            ..Default::default()
        };
        assert_eq!(run(&mut launcher, &mut cleanup), 1);
    }

    #[test]
    fn test_spawn_failure() {
        let mut launcher = Scripted::new(&[]);
        let mut cleanup = Counting::default();
        assert!(Supervisor::new(&mut launcher, &mut cleanup).run().is_err());
        assert_eq!(cleanup.runs, 0);
    }
}
