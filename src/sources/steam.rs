use crate::error::ScanError;
use crate::model::{AppKind, ApplicationEntry};
use crate::platform::home_dir;
use crate::sources::Source;
use log::debug;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Installed Steam games, read from each library's `appmanifest_*.acf`.
pub struct SteamSource {
    libraries: Vec<PathBuf>,
}

impl SteamSource {
    pub fn new(libraries: Vec<PathBuf>) -> Self {
        Self { libraries }
    }

    pub fn with_extra_libraries(extra: Vec<PathBuf>) -> Self {
        let mut libraries = default_libraries();
        libraries.extend(extra);
        Self::new(libraries)
    }
}

impl Source for SteamSource {
    fn name(&self) -> &'static str {
        "Steam"
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        for library in &self.libraries {
            let steamapps = library.join("steamapps");
            let read_dir = match fs::read_dir(&steamapps) {
                Ok(read_dir) => read_dir,
                Err(_) => continue,
            };
            debug!("Scanning Steam manifests in {:?}", steamapps);

            let mut manifests: Vec<PathBuf> = read_dir
                .flatten()
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|s| s.to_str())
                        .is_some_and(|n| n.starts_with("appmanifest_") && n.ends_with(".acf"))
                })
                .collect();
            manifests.sort();

            for manifest in manifests {
                match fs::read_to_string(&manifest) {
                    Ok(content) => out.extend(parse_manifest(&content, &steamapps)),
                    Err(e) => debug!("Steam: cannot read {:?}: {}", manifest, e),
                }
            }
        }
        Ok(())
    }
}

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""name"\s*"([^"]+)""#).unwrap());
static INSTALL_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""installdir"\s*"([^"]+)""#).unwrap());
static APP_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""appid"\s*"([^"]+)""#).unwrap());

/// Reads name, install directory and numeric app id from a manifest; any of
/// them missing means the manifest is skipped.
pub fn parse_manifest(content: &str, steamapps: &Path) -> Option<ApplicationEntry> {
    let name = NAME.captures(content)?.get(1)?.as_str();
    let install_dir = INSTALL_DIR.captures(content)?.get(1)?.as_str();
    let app_id = APP_ID.captures(content)?.get(1)?.as_str();
    if app_id.is_empty() || !app_id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let uri = format!("steam://rungameid/{app_id}");
    let location = steamapps.join("common").join(install_dir);
    Some(
        ApplicationEntry::new(name, uri.clone(), uri, AppKind::GamePlatformTitle)?
            .description("Steam Game")
            .install_location(location.to_string_lossy())
            .publisher("Steam"),
    )
}

fn default_libraries() -> Vec<PathBuf> {
    let mut libraries = Vec::new();
    if cfg!(windows) {
        libraries.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        libraries.push(PathBuf::from(r"C:\Program Files\Steam"));
        if let Some(home) = home_dir() {
            libraries.push(home.join(r"AppData\Local\Steam"));
        }
        return libraries;
    }
    if let Some(home) = home_dir() {
        libraries.push(home.join(".steam/steam"));
        libraries.push(home.join(".local/share/Steam"));
        libraries.push(home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"));
    }
    libraries
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
"AppState"
{
	"appid"		"620"
	"Universe"		"1"
	"name"		"Portal 2"
	"StateFlags"		"4"
	"installdir"		"Portal 2"
}
"#;

    #[test]
    fn parses_flat_key_values() {
        let entry = parse_manifest(MANIFEST, Path::new("/games/steamapps")).unwrap();
        assert_eq!(entry.name, "portal 2");
        assert_eq!(entry.launch_command, "steam://rungameid/620");
        assert_eq!(entry.path, "steam://rungameid/620");
        assert_eq!(entry.kind, AppKind::GamePlatformTitle);
        assert!(entry.install_location.ends_with("Portal 2"));
        assert!(entry.keywords.contains("steam"));
    }

    #[test]
    fn incomplete_or_non_numeric_manifests_are_skipped() {
        let no_dir = MANIFEST.replace("installdir", "somethingelse");
        assert!(parse_manifest(&no_dir, Path::new("/s")).is_none());
        let bad_id = MANIFEST.replace("\"620\"", "\"abc\"");
        assert!(parse_manifest(&bad_id, Path::new("/s")).is_none());
        assert!(parse_manifest("garbage", Path::new("/s")).is_none());
    }

    #[test]
    fn scans_library_manifests_only() {
        let library = tempfile::tempdir().unwrap();
        let steamapps = library.path().join("steamapps");
        fs::create_dir_all(&steamapps).unwrap();
        fs::write(steamapps.join("appmanifest_620.acf"), MANIFEST).unwrap();
        fs::write(steamapps.join("appmanifest_1.acf"), "broken").unwrap();
        fs::write(steamapps.join("libraryfolders.vdf"), MANIFEST).unwrap();

        let source = SteamSource::new(vec![library.path().to_path_buf(), PathBuf::from("/no/library")]);
        let mut out = Vec::new();
        source.scan(&mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].display_name, "Portal 2");
    }
}
