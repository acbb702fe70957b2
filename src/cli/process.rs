use std::{env, path::Path, process::Stdio};

use anyhow::Result;
use sysinfo::{Signal, System, get_current_pid};

use super::daemon_path::to_daemon_path;

pub fn kill_previous_daemons(name: &Path) {
    let system = System::new_all();
    let current_id = get_current_pid().unwrap();
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            // This will forcefully terminate the process on Windows. Anything better will
            // require a lot more work.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
}

/// Intended for shutting down a previous bot daemon and starting a new one. The daemon
/// binary detaches itself, so this only has to spawn it and let the parent side exit.
pub fn restart_daemon() -> Result<()> {
    // The daemon binary is expected to sit next to the cli executable.
    let cli_path = env::current_exe().expect("Can't operate without an executable");
    let daemon_path = to_daemon_path(cli_path);
    kill_previous_daemons(&daemon_path);

    let mut command = std::process::Command::new(daemon_path);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    println!("Spawning");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    println!("Success");
    Ok(())
}
