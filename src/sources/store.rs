use crate::error::ScanError;
use crate::model::{AppKind, ApplicationEntry};
use crate::platform::run_with_timeout;
use crate::sources::Source;
use serde::Deserialize;
use std::time::Duration;

const INVENTORY_TIMEOUT: Duration = Duration::from_secs(30);

const APPX_QUERY: &str = "Get-AppxPackage | \
    Where-Object { $_.Name -notlike '*Microsoft*' -and $_.Name -notlike '*Windows*' } | \
    Select-Object Name, PackageFullName, InstallLocation, DisplayName | ConvertTo-Json";

/// Flatpak runtimes and platform namespaces that are not user applications.
const FLATPAK_EXCLUDED: [&str; 4] = [
    "org.freedesktop.",
    "org.gnome.Platform",
    "org.kde.Platform",
    "org.gtk.Gtk3theme.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Windows Store packages via `Get-AppxPackage`.
    Appx,
    /// Flathub and other Flatpak remotes.
    Flatpak,
}

pub struct StoreSource {
    backend: StoreBackend,
}

impl StoreSource {
    pub fn new(backend: StoreBackend) -> Self {
        Self { backend }
    }

    pub fn platform() -> Self {
        if cfg!(windows) {
            Self::new(StoreBackend::Appx)
        } else {
            Self::new(StoreBackend::Flatpak)
        }
    }
}

impl Source for StoreSource {
    fn name(&self) -> &'static str {
        "Store"
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        match self.backend {
            StoreBackend::Appx => {
                let output = run_with_timeout(
                    "powershell",
                    &["-NoProfile", "-Command", APPX_QUERY],
                    INVENTORY_TIMEOUT,
                )?;
                out.extend(parse_appx_packages(&output)?);
            }
            StoreBackend::Flatpak => {
                let output = run_with_timeout(
                    "flatpak",
                    &["list", "--app", "--columns=application,name"],
                    INVENTORY_TIMEOUT,
                )?;
                out.extend(parse_flatpak_list(&output));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AppxPackage {
    name: Option<String>,
    package_full_name: Option<String>,
    install_location: Option<String>,
    display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Parses `ConvertTo-Json` output, which is an object for a single package
/// and an array otherwise.
pub fn parse_appx_packages(json: &str) -> Result<Vec<ApplicationEntry>, ScanError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let packages: OneOrMany<AppxPackage> =
        serde_json::from_str(json).map_err(|e| ScanError::Malformed {
            origin: "Get-AppxPackage".to_string(),
            reason: e.to_string(),
        })?;
    let packages = match packages {
        OneOrMany::Many(list) => list,
        OneOrMany::One(one) => vec![one],
    };

    Ok(packages
        .into_iter()
        .filter(|p| p.name.is_some())
        .filter_map(|p| {
            let display_name = p.display_name.filter(|d| !d.trim().is_empty())?;
            let full_name = p.package_full_name.filter(|n| !n.is_empty())?;
            let launch = format!("explorer.exe shell:appsFolder\\{full_name}!App");
            Some(
                ApplicationEntry::new(
                    display_name,
                    p.install_location.clone().unwrap_or_default(),
                    launch,
                    AppKind::StorePackage,
                )?
                .description("Windows Store App")
                .install_location(p.install_location.unwrap_or_default())
                .publisher("Microsoft Store"),
            )
        })
        .collect())
}

/// Parses `flatpak list --app --columns=application,name`.
pub fn parse_flatpak_list(output: &str) -> Vec<ApplicationEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split('\t');
            let app_id = columns.next()?.trim();
            let name = columns.next().map(str::trim).filter(|n| !n.is_empty()).unwrap_or(app_id);
            if app_id.is_empty() || FLATPAK_EXCLUDED.iter().any(|ns| app_id.starts_with(ns)) {
                return None;
            }
            Some(
                ApplicationEntry::new(name, "", format!("flatpak run {app_id}"), AppKind::StorePackage)?
                    .description("Flatpak application")
                    .publisher("Flatpak"),
            )
        })
        .collect()
}
