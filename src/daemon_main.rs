use std::env::args;

use anyhow::Result;
use clap::Parser;
use timetracker::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

fn main() -> Result<()> {
    run_service(args().collect::<Vec<_>>())
}

fn run_service(command_args: Vec<String>) -> Result<()> {
    let args = DaemonArgs::parse_from(&command_args);

    #[cfg(unix)]
    if !args.force {
        use daemonize::Daemonize;

        let daemonize = Daemonize::new()
            .stdout(daemonize::Stdio::devnull())
            .stderr(daemonize::Stdio::devnull())
            .execute();
        match daemonize {
            daemonize::Outcome::Parent(parent) => {
                parent.map_err(|e| anyhow::anyhow!("Failed to create daemon: {e}"))?;
                println!("Created daemon");
                return Ok(());
            }
            daemonize::Outcome::Child(child) => {
                child.map_err(|e| anyhow::anyhow!("Failed to detach daemon: {e}"))?;
            }
        }
    }

    run(args)
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    let app_dir = std::path::absolute(app_dir)?;
    enable_logging(DAEMON_PREFIX, &app_dir.join("logs"), args.log, args.log_console)?;
    single_thread_runtime()?.block_on(start_daemon(app_dir, args.config))
}
