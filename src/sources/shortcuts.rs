use crate::error::ScanError;
use crate::model::{AppKind, ApplicationEntry};
use crate::platform::{home_dir, quote, run_with_timeout};
use crate::sources::Source;
use crate::sources::desktop::parse_desktop_file;
use directories::{BaseDirs, UserDirs};
use log::debug;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const LNK_TIMEOUT: Duration = Duration::from_secs(10);

/// What a shortcut file points at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedShortcut {
    pub target: String,
    pub arguments: String,
    pub description: Option<String>,
    pub working_dir: Option<String>,
    /// Label carried inside the shortcut; the file stem is used otherwise.
    pub display_name: Option<String>,
    pub icon: Option<String>,
}

pub trait ShortcutResolver: Send {
    /// File extension handled, without the dot.
    fn extension(&self) -> &'static str;
    fn resolve(&self, shortcut: &Path) -> Result<Option<ResolvedShortcut>, ScanError>;
}

/// Windows `.lnk` files, read through the `WScript.Shell` COM object.
pub struct LnkResolver;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LnkInfo {
    target_path: Option<String>,
    arguments: Option<String>,
    description: Option<String>,
    working_directory: Option<String>,
}

impl ShortcutResolver for LnkResolver {
    fn extension(&self) -> &'static str {
        "lnk"
    }

    fn resolve(&self, shortcut: &Path) -> Result<Option<ResolvedShortcut>, ScanError> {
        let escaped = shortcut.to_string_lossy().replace('\'', "''");
        let script = format!(
            "$s = (New-Object -ComObject WScript.Shell).CreateShortcut('{escaped}'); \
             $s | Select-Object TargetPath, Arguments, Description, WorkingDirectory | ConvertTo-Json"
        );
        let output = run_with_timeout("powershell", &["-NoProfile", "-Command", &script], LNK_TIMEOUT)?;
        let info: LnkInfo = serde_json::from_str(output.trim()).map_err(|e| ScanError::Malformed {
            origin: shortcut.display().to_string(),
            reason: e.to_string(),
        })?;

        let Some(target) = info.target_path.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        Ok(Some(ResolvedShortcut {
            target,
            arguments: info.arguments.unwrap_or_default(),
            description: info.description.filter(|d| !d.is_empty()),
            working_dir: info.working_directory.filter(|d| !d.is_empty()),
            display_name: None,
            icon: None,
        }))
    }
}

/// Freedesktop `.desktop` launchers; the Exec program is looked up on `PATH`.
pub struct DesktopFileResolver;

impl ShortcutResolver for DesktopFileResolver {
    fn extension(&self) -> &'static str {
        "desktop"
    }

    fn resolve(&self, shortcut: &Path) -> Result<Option<ResolvedShortcut>, ScanError> {
        let content = fs::read_to_string(shortcut).map_err(|e| ScanError::io(shortcut, e))?;
        let Some(file) = parse_desktop_file(&content) else {
            return Ok(None);
        };
        let Some((program, args)) = file.program_and_args() else {
            return Ok(None);
        };
        let target = which::which(&program)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(program);
        // Arguments are rejoined into one command line, so spaced ones keep their quotes.
        let arguments = args
            .iter()
            .map(|arg| if arg.chars().any(char::is_whitespace) { quote(arg) } else { arg.clone() })
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Some(ResolvedShortcut {
            target,
            arguments,
            description: file.comment,
            working_dir: file.working_dir,
            display_name: Some(file.name),
            icon: file.icon,
        }))
    }
}

fn platform_resolver() -> Box<dyn ShortcutResolver> {
    if cfg!(windows) {
        Box::new(LnkResolver)
    } else {
        Box::new(DesktopFileResolver)
    }
}

/// Shortcut files under a set of roots (start menu or desktop).
pub struct ShortcutSource {
    label: &'static str,
    roots: Vec<PathBuf>,
    recursive: bool,
    resolver: Box<dyn ShortcutResolver>,
}

impl ShortcutSource {
    pub fn new(
        label: &'static str,
        roots: Vec<PathBuf>,
        recursive: bool,
        resolver: Box<dyn ShortcutResolver>,
    ) -> Self {
        Self { label, roots, recursive, resolver }
    }

    pub fn start_menu() -> Self {
        Self::new("StartMenu", start_menu_roots(), true, platform_resolver())
    }

    pub fn desktop() -> Self {
        let roots = UserDirs::new()
            .and_then(|dirs| dirs.desktop_dir().map(Path::to_path_buf))
            .into_iter()
            .collect();
        Self::new("Desktop", roots, false, platform_resolver())
    }

    fn shortcut_files(&self, root: &Path) -> Vec<PathBuf> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(self.resolver.extension()))
            })
            .collect();
        files.sort();
        files
    }

    fn entry_for(&self, shortcut: &Path, resolved: ResolvedShortcut) -> Option<ApplicationEntry> {
        if !Path::new(&resolved.target).exists() {
            debug!("{}: {:?} points at missing {}", self.label, shortcut, resolved.target);
            return None;
        }

        let display_name = resolved.display_name.clone().unwrap_or_else(|| {
            shortcut
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let mut launch_command = quote(&resolved.target);
        if !resolved.arguments.trim().is_empty() {
            launch_command.push(' ');
            launch_command.push_str(resolved.arguments.trim());
        }

        let description = resolved
            .description
            .unwrap_or_else(|| format!("{} shortcut", self.label));

        Some(
            ApplicationEntry::new(display_name, resolved.target, launch_command, AppKind::Shortcut)?
                .description(description)
                .install_location(resolved.working_dir.unwrap_or_default())
                .icon_path(resolved.icon.unwrap_or_default()),
        )
    }
}

impl Source for ShortcutSource {
    fn name(&self) -> &'static str {
        self.label
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        for root in &self.roots {
            if !root.is_dir() {
                debug!("{}: {:?} does not exist, skipping", self.label, root);
                continue;
            }
            debug!("Scanning shortcuts in {:?}", root);
            for shortcut in self.shortcut_files(root) {
                match self.resolver.resolve(&shortcut) {
                    Ok(Some(resolved)) => out.extend(self.entry_for(&shortcut, resolved)),
                    Ok(None) => {}
                    Err(e) => debug!("{}: cannot resolve {:?}: {}", self.label, shortcut, e),
                }
            }
        }
        Ok(())
    }
}

fn start_menu_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if cfg!(windows) {
        for var in ["APPDATA", "PROGRAMDATA"] {
            if let Some(base) = env::var_os(var) {
                roots.push(PathBuf::from(base).join(r"Microsoft\Windows\Start Menu\Programs"));
            }
        }
        return roots;
    }

    if let Some(base_dirs) = BaseDirs::new() {
        roots.push(base_dirs.data_dir().join("applications"));
    }
    roots.push(PathBuf::from("/usr/share/applications"));
    roots.push(PathBuf::from("/usr/local/share/applications"));
    roots.push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
    roots.push(PathBuf::from("/var/lib/snapd/desktop/applications"));
    if let Some(home) = home_dir() {
        roots.push(home.join(".local/share/flatpak/exports/share/applications"));
    }
    roots
}
