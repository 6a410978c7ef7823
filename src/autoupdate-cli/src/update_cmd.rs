//! Check for a newer release and install it.

use std::io::{Write, stdout};
use std::path::Path;

use anyhow::{Context, Result, bail};
use autoupdate_core::{
    AutoUpdater, ChangeLog, DownloadState, EventReceiver, UpdateConfig, UpdateEvent,
    UpdaterSettings, VersionEntry, format_bytes, latest_entry,
};

use crate::args::Cli;
use crate::output::{is_installable, print_entry, print_progress};

/// Answer to the install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Skip,
}

impl Cli {
    /// Run the update flow.
    pub async fn run(self) -> Result<()> {
        let mut settings = load_settings(self.settings.as_deref())?;
        let config = self.build_config(&settings)?;
        let extension = config.file_extension().to_string();
        let current = config.current_version().to_string();

        tracing::info!(repository = %config.repository(), current = %current, "Checking for updates");

        let (updater, mut events) =
            AutoUpdater::with_channel(config).context("Failed to initialize updater")?;
        updater
            .check_for_updates()
            .context("Failed to start update check")?;

        let changelog = match events.recv().await {
            Some(UpdateEvent::UpdateAvailable(changelog)) => changelog,
            Some(UpdateEvent::Error(e)) => {
                return Err(anyhow::Error::new(e).context("Failed to check for updates"));
            }
            Some(other) => bail!("Unexpected update event: {other:?}"),
            None => bail!("Update check ended without a result"),
        };

        let offered: ChangeLog = changelog
            .into_iter()
            .filter(|entry| !settings.is_version_skipped(&entry.version_string))
            .collect();

        let Some(latest) = latest_entry(&offered).cloned() else {
            if !self.silent {
                println!("✓ You are already on the latest version (v{current})");
            }
            return Ok(());
        };

        println!(
            "→ Update available: v{current} → v{}",
            latest.version_string
        );
        println!("\nChanges:");
        for entry in &offered {
            if !print_entry(entry)? {
                return Ok(());
            }
        }

        if self.check {
            println!(
                "\nRun without --check to install v{}.",
                latest.version_string
            );
            return Ok(());
        }

        if !is_installable(&latest, &extension) {
            println!(
                "\nNo {extension} installer is attached to this release. Download it manually from:\n  {}",
                latest.version_update_url
            );
            return Ok(());
        }

        if !self.yes {
            match prompt(&latest.version_string)? {
                Answer::Yes => {}
                Answer::No => {
                    println!("Update cancelled.");
                    return Ok(());
                }
                Answer::Skip => {
                    settings.skip_version = Some(latest.version_string.clone());
                    save_settings(&settings, self.settings.as_deref())?;
                    println!(
                        "v{} will not be offered again.",
                        latest.version_string
                    );
                    return Ok(());
                }
            }
        }

        install(&updater, &mut events, &latest).await
    }

    fn build_config(&self, settings: &UpdaterSettings) -> Result<UpdateConfig> {
        let repository = self
            .repository
            .clone()
            .or_else(|| settings.repository.clone())
            .context("No repository given: pass OWNER/REPO or set \"repository\" in the settings file")?;

        let mut config = settings.apply(UpdateConfig::new(&repository, &self.current_version)?);

        if let Some(tag) = &self.tag {
            config = config.with_filename_tag(tag.clone());
        }
        if let Some(token) = &self.token {
            config = config.with_access_token(token.trim().to_string());
        }
        if self.pre {
            config = config.with_prereleases(true);
        }
        if let Some(url) = &self.api_url {
            config = config.with_api_base(url.clone());
        }
        if let Some(extension) = &self.extension {
            config = config.with_file_extension(extension.clone());
        }
        if self.fallback {
            config = config.with_release_page_fallback(true);
        }
        if let Some(dir) = &self.download_dir {
            config = config.with_download_dir(dir.clone());
        }
        Ok(config)
    }
}

fn load_settings(path: Option<&Path>) -> Result<UpdaterSettings> {
    match path {
        Some(path) if path.exists() => UpdaterSettings::load_from(path)
            .with_context(|| format!("Failed to read settings from {}", path.display())),
        Some(_) => Ok(UpdaterSettings::default()),
        None => Ok(UpdaterSettings::load()),
    }
}

fn save_settings(settings: &UpdaterSettings, path: Option<&Path>) -> Result<()> {
    let saved = match path {
        Some(path) => settings.save_to(path),
        None => settings.save(),
    };
    saved.context("Failed to save settings")
}

fn parse_answer(input: &str) -> Answer {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Answer::Yes,
        "s" | "skip" => Answer::Skip,
        _ => Answer::No,
    }
}

fn prompt(version: &str) -> Result<Answer> {
    print!("\nInstall v{version} now? [y/N, s = skip this version] ");
    stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(parse_answer(&input))
}

/// Download the installer, reporting progress until it is launched.
///
/// Ctrl-C cancels the transfer and keeps the partial file.
async fn install(
    updater: &AutoUpdater,
    events: &mut EventReceiver,
    entry: &VersionEntry,
) -> Result<()> {
    println!("\nDownloading v{}...", entry.version_string);

    let handle = updater
        .download_and_install_update(&entry.version_update_url, &entry.version_update_filename)
        .context("Failed to start download")?;
    let path = handle.path().to_path_buf();
    let cancel = handle.cancellation_token();
    let wait = handle.wait();
    tokio::pin!(wait);

    let state = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => report_download_event(event, &path)?,
            state = &mut wait => break state,
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                cancel.cancel();
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        report_download_event(event, &path)?;
    }

    match state {
        DownloadState::Finished => {
            println!("✓ Installer started. Close the application to complete the update.");
            Ok(())
        }
        DownloadState::Cancelled => {
            println!(
                "\nDownload cancelled. Partial file left at {}",
                path.display()
            );
            Ok(())
        }
        other => bail!("Download did not complete ({other:?})"),
    }
}

fn report_download_event(event: UpdateEvent, path: &Path) -> Result<()> {
    match event {
        UpdateEvent::DownloadProgress(percent) => {
            print_progress(percent)?;
        }
        UpdateEvent::DownloadFinished => {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            println!("\n  Downloaded {} to {}", format_bytes(size), path.display());
        }
        UpdateEvent::Error(e) => return Err(anyhow::Error::new(e).context("Download failed")),
        UpdateEvent::UpdateAvailable(_) => {}
    }
    Ok(())
}
