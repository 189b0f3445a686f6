use crate::error::ScanError;
use crate::model::{AppKind, ApplicationEntry};
use crate::platform::{find_executables, is_executable, quote, run_with_timeout};
use crate::sources::Source;
use log::{debug, info};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

const UNINSTALL_HIVES: [&str; 3] = [
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Executables inspected per install directory.
const MAX_CANDIDATES: usize = 10;
/// Directory levels below the install directory searched for executables.
const SEARCH_DEPTH: usize = 2;

/// One installed-program record from the package registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UninstallRecord {
    pub key: String,
    pub display_name: Option<String>,
    pub install_location: Option<String>,
    pub display_icon: Option<String>,
    pub publisher: Option<String>,
    pub display_version: Option<String>,
}

/// Where uninstall records come from. Each hive is read independently so a
/// failing one does not hide the others.
pub trait RecordProvider: Send {
    fn available(&self) -> bool {
        true
    }
    fn hives(&self) -> Vec<String>;
    fn read_hive(&self, hive: &str, timeout: Duration) -> Result<Vec<UninstallRecord>, ScanError>;
}

/// Reads the Windows Uninstall keys through `reg query`.
pub struct RegQuery;

impl RecordProvider for RegQuery {
    fn available(&self) -> bool {
        cfg!(windows)
    }

    fn hives(&self) -> Vec<String> {
        UNINSTALL_HIVES.iter().map(|h| h.to_string()).collect()
    }

    fn read_hive(&self, hive: &str, timeout: Duration) -> Result<Vec<UninstallRecord>, ScanError> {
        let output = run_with_timeout("reg", &["query", hive, "/s"], timeout)?;
        Ok(parse_reg_query(&output))
    }
}

pub struct RegistrySource {
    provider: Box<dyn RecordProvider>,
    budget: Duration,
}

impl RegistrySource {
    pub fn with_budget(budget: Duration) -> Self {
        Self::new(Box::new(RegQuery), budget)
    }

    pub fn new(provider: Box<dyn RecordProvider>, budget: Duration) -> Self {
        Self { provider, budget }
    }
}

impl Source for RegistrySource {
    fn name(&self) -> &'static str {
        "Registry"
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        if !self.provider.available() {
            return Err(ScanError::Unsupported);
        }

        let started = Instant::now();
        let mut processed = 0usize;

        for hive in self.provider.hives() {
            let Some(remaining) = self.budget.checked_sub(started.elapsed()) else {
                info!("Registry: budget exhausted after {} records", processed);
                return Ok(());
            };

            let records = match self.provider.read_hive(&hive, remaining) {
                Ok(records) => records,
                Err(e) => {
                    debug!("Registry: skipping {}: {}", hive, e);
                    continue;
                }
            };

            for record in records {
                if started.elapsed() > self.budget {
                    info!("Registry: budget exhausted after {} records", processed);
                    return Ok(());
                }
                if let Some(entry) = entry_from_record(&record) {
                    out.push(entry);
                }
                processed += 1;
            }
        }
        Ok(())
    }
}

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

fn is_patch(display_name: &str) -> bool {
    display_name.starts_with("KB") || display_name.starts_with("Security Update")
}

/// Turns a record into an entry; patches and records with nothing to launch
/// are dropped.
pub fn entry_from_record(record: &UninstallRecord) -> Option<ApplicationEntry> {
    let display_name = record.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    if is_patch(display_name) {
        return None;
    }

    let install_location = record.install_location.clone().unwrap_or_default();
    let display_icon = record.display_icon.clone().unwrap_or_default();
    let publisher = record.publisher.clone().unwrap_or_default();

    let mut exe_path = String::new();
    if !install_location.is_empty() && Path::new(&install_location).is_dir() {
        let candidates = find_executables(Path::new(&install_location), SEARCH_DEPTH, MAX_CANDIDATES);
        let wanted = NON_WORD.replace_all(display_name, "").to_lowercase();
        let preferred = candidates.iter().find(|exe| {
            exe.file_stem()
                .map(|s| s.to_string_lossy().to_lowercase().contains(&wanted))
                .unwrap_or(false)
        });
        if let Some(exe) = preferred.or(candidates.first()) {
            exe_path = exe.to_string_lossy().into_owned();
        }
    }

    if exe_path.is_empty() && !display_icon.is_empty() {
        let icon_target = display_icon.split(',').next().unwrap_or_default().trim().trim_matches('"');
        if is_executable(Path::new(icon_target)) {
            exe_path = icon_target.to_string();
        }
    }

    let (path, launch_command) = if !exe_path.is_empty() {
        (exe_path.clone(), quote(&exe_path))
    } else if !install_location.is_empty() {
        (install_location.clone(), quote(&install_location))
    } else {
        return None;
    };

    let description = if publisher.is_empty() {
        "Installed application".to_string()
    } else {
        format!("Installed application by {publisher}")
    };

    Some(
        ApplicationEntry::new(display_name, path, launch_command, AppKind::Executable)?
            .description(description)
            .icon_path(display_icon)
            .install_location(install_location)
            .publisher(publisher)
            .version(record.display_version.clone().unwrap_or_default()),
    )
}

static VALUE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\S.*?)\s+REG_[A-Z_]+\s*(.*)$").unwrap());

/// Parses `reg query <key> /s` output into one record per subkey.
pub fn parse_reg_query(output: &str) -> Vec<UninstallRecord> {
    let mut records = Vec::new();
    let mut current: Option<UninstallRecord> = None;

    for line in output.lines() {
        let trimmed = line.trim_end();
        if trimmed.starts_with("HKEY_") {
            records.extend(current.take());
            let key = trimmed.rsplit('\\').next().unwrap_or(trimmed).to_string();
            current = Some(UninstallRecord { key, ..Default::default() });
            continue;
        }
        let (Some(record), Some(caps)) = (current.as_mut(), VALUE_LINE.captures(trimmed)) else {
            continue;
        };
        let value = caps[2].trim().to_string();
        if value.is_empty() {
            continue;
        }
        match &caps[1] {
            "DisplayName" => record.display_name = Some(value),
            "InstallLocation" => record.install_location = Some(value),
            "DisplayIcon" => record.display_icon = Some(value),
            "Publisher" => record.publisher = Some(value),
            "DisplayVersion" => record.display_version = Some(value),
            _ => {}
        }
    }
    records.extend(current);
    // The hive root itself carries no values.
    records.retain(|r| r.display_name.is_some() || r.install_location.is_some());
    records
}
