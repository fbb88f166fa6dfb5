use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Context, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

fn daemon_executable() -> Result<PathBuf> {
    let cli = env::current_exe().context("Can't operate without an executable")?;
    Ok(to_daemon_path(cli))
}

/// Stops every running daemon started from the binary next to this executable.
pub fn kill_previous_servers() -> Result<()> {
    let name = daemon_executable()?;
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get own pid: {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            // This will forcefully terminate the process on Windows. Anything better will require a
            // lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped += 1;
        }
    }
    info!("Stopped {stopped} daemon processes");
    println!("Stopped {stopped} daemon processes");
    Ok(())
}

/// Shuts down previous daemons and starts a new one. On unix the daemon detaches by itself, so
/// the spawned process exits right after forking.
pub fn restart_server(app_dir: &Path, config: Option<&Path>) -> Result<()> {
    kill_previous_servers()?;
    let daemon = daemon_executable()?;
    let mut command = std::process::Command::new(&daemon);
    // The daemon works from `/`, relative paths have to be resolved here.
    command.arg("--dir").arg(std::path::absolute(app_dir)?);
    if let Some(config) = config {
        command.arg("--config").arg(std::path::absolute(config)?);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    println!("Spawning {daemon:?}");
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        let status = command
            .status()
            .with_context(|| format!("Failed to start {daemon:?}"))?;
        if !status.success() {
            return Err(anyhow!("Daemon exited with {status}"));
        }
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::zombie_processes)]
        let _ = command
            .spawn()
            .with_context(|| format!("Failed to start {daemon:?}"))?;
    }
    println!("Success");
    Ok(())
}
