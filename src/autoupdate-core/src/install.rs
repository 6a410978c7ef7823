//! Platform-specific installer launch.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Starts a downloaded installer.
///
/// Called once per successful download with the absolute path of the file.
/// The application is expected to exit after a successful launch.
pub trait InstallerLauncher: Send + Sync {
    fn launch(&self, installer: &Path) -> io::Result<()>;
}

/// Default launcher: runs the installer as a detached process.
///
/// - Windows: the file is executed directly.
/// - macOS: the file is handed to `open` (mounts a `.dmg`).
/// - Other Unix: the file is marked executable and executed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl InstallerLauncher for DetachedLauncher {
    fn launch(&self, installer: &Path) -> io::Result<()> {
        let mut command = launch_command(installer)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn()?;
        tracing::info!(
            installer = %installer.display(),
            pid = child.id(),
            "Installer started"
        );
        Ok(())
    }
}

#[cfg(windows)]
fn launch_command(installer: &Path) -> io::Result<Command> {
    Ok(Command::new(installer))
}

#[cfg(target_os = "macos")]
fn launch_command(installer: &Path) -> io::Result<Command> {
    let mut command = Command::new("open");
    command.arg(installer);
    Ok(command)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn launch_command(installer: &Path) -> io::Result<Command> {
    ensure_executable(installer)?;
    Ok(Command::new(installer))
}

/// Set mode 0o755 on a downloaded file.
#[cfg(unix)]
pub fn ensure_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions)
}
