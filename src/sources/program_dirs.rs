use crate::error::ScanError;
use crate::model::{AppKind, ApplicationEntry};
use crate::platform::{find_executables, home_dir, quote};
use crate::sources::Source;
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Stem fragments of executables that are never the program itself.
const SKIP_PATTERNS: [&str; 10] = [
    "uninstall", "setup", "install", "updater", "launcher",
    "helper", "crash", "report", "service", "daemon",
];

/// One application per top-level folder of the program roots.
pub struct ProgramDirsSource {
    roots: Vec<PathBuf>,
}

impl ProgramDirsSource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn with_extra_roots(extra: Vec<PathBuf>) -> Self {
        let mut roots = default_roots();
        roots.extend(extra);
        Self::new(roots)
    }
}

impl Source for ProgramDirsSource {
    fn name(&self) -> &'static str {
        "ProgramDirs"
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        for root in &self.roots {
            let read_dir = match fs::read_dir(root) {
                Ok(read_dir) => read_dir,
                Err(e) => {
                    debug!("ProgramDirs: skipping {:?}: {}", root, e);
                    continue;
                }
            };
            debug!("Scanning program folders in {:?}", root);

            let mut folders: Vec<PathBuf> = read_dir
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            folders.sort();

            for folder in folders {
                out.extend(entry_for_folder(&folder));
            }
        }
        Ok(())
    }
}

fn entry_for_folder(folder: &Path) -> Option<ApplicationEntry> {
    let folder_name = folder.file_name()?.to_string_lossy().into_owned();
    let executables = find_executables(folder, 0, usize::MAX);
    let main = find_main_executable(&executables, &folder_name)?;
    let path = main.to_string_lossy().into_owned();

    Some(
        ApplicationEntry::new(folder_name, path.clone(), quote(&path), AppKind::Executable)?
            .description("Installed application")
            .install_location(folder.to_string_lossy()),
    )
}

fn alphanumeric_lowercase(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Picks the program's own executable: helpers and installers are skipped,
/// then a stem related to the folder name wins over the first remaining one.
pub fn find_main_executable<'a>(executables: &'a [PathBuf], folder_name: &str) -> Option<&'a PathBuf> {
    let candidates: Vec<&PathBuf> = executables
        .iter()
        .filter(|exe| {
            let stem = stem_lowercase(exe);
            !SKIP_PATTERNS.iter().any(|pattern| stem.contains(pattern))
        })
        .collect();

    let folder = alphanumeric_lowercase(folder_name);
    candidates
        .iter()
        .find(|exe| {
            let stem = alphanumeric_lowercase(&stem_lowercase(exe));
            !stem.is_empty() && (folder.contains(&stem) || stem.contains(&folder))
        })
        .or(candidates.first())
        .copied()
}

fn stem_lowercase(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn default_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        let mut roots: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|var| env::var_os(var).map(PathBuf::from))
            .collect();
        if roots.is_empty() {
            roots.push(PathBuf::from(r"C:\Program Files"));
        }
        return roots;
    }

    let mut roots = vec![PathBuf::from("/opt")];
    if let Some(home) = home_dir() {
        roots.push(home.join("Applications"));
        roots.push(home.join(".local/opt"));
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/opt/App/{n}"))).collect()
    }

    #[test]
    fn skips_helpers_and_prefers_folder_named_stem() {
        let exes = paths(&["Uninstall.exe", "crashpad_handler.exe", "tool.exe", "Obsidian.exe"]);
        let main = find_main_executable(&exes, "Obsidian").unwrap();
        assert!(main.ends_with("Obsidian.exe"));
    }

    #[test]
    fn stem_contained_in_folder_name_also_counts() {
        let exes = paths(&["aaa.exe", "code.exe"]);
        let main = find_main_executable(&exes, "Microsoft VS Code").unwrap();
        assert!(main.ends_with("code.exe"));
    }

    #[test]
    fn falls_back_to_first_candidate_or_nothing() {
        let exes = paths(&["setup.exe", "alpha.exe", "beta.exe"]);
        assert!(find_main_executable(&exes, "Zeta").unwrap().ends_with("alpha.exe"));

        let only_helpers = paths(&["updater.exe", "UpdateService.exe"]);
        assert!(find_main_executable(&only_helpers, "Zeta").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn scans_each_top_level_folder() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let app = root.path().join("Krita");
        fs::create_dir_all(app.join("lib")).unwrap();
        for name in ["krita", "krita-updater"] {
            let p = app.join(name);
            fs::write(&p, "").unwrap();
            fs::set_permissions(&p, fs::Permissions::from_mode(0o755)).unwrap();
        }
        fs::create_dir_all(root.path().join("EmptyVendor")).unwrap();

        let source = ProgramDirsSource::new(vec![root.path().to_path_buf(), PathBuf::from("/no/such/root")]);
        let mut out = Vec::new();
        source.scan(&mut out).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "krita");
        assert!(out[0].path.ends_with("Krita/krita"));
        assert_eq!(out[0].install_location, app.to_string_lossy());
    }
}
