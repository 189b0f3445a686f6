use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// How an application is started and how its processes are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    Executable,
    Shortcut,
    StorePackage,
    GamePlatformTitle,
    SystemUtility,
}

impl AppKind {
    /// Kinds whose launch command is handed to the OS as-is.
    pub fn launches_directly(self) -> bool {
        matches!(
            self,
            AppKind::StorePackage | AppKind::GamePlatformTitle | AppKind::SystemUtility
        )
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppKind::Executable => "executable",
            AppKind::Shortcut => "shortcut",
            AppKind::StorePackage => "store-package",
            AppKind::GamePlatformTitle => "game",
            AppKind::SystemUtility => "system",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationEntry {
    pub name: String,
    pub display_name: String,
    pub path: String,
    pub launch_command: String,
    pub kind: AppKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_path: String,
    #[serde(default)]
    pub install_location: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub last_launched_at: Option<DateTime<Utc>>,
}

impl ApplicationEntry {
    /// Builds an entry whose matching name is derived from `display_name`.
    /// Returns `None` when the cleaned name or the launch command is empty.
    pub fn new(
        display_name: impl Into<String>,
        path: impl Into<String>,
        launch_command: impl Into<String>,
        kind: AppKind,
    ) -> Option<Self> {
        let display_name = display_name.into();
        let name = clean_app_name(&display_name);
        Self::with_name(name, display_name, path, launch_command, kind)
    }

    /// Like [`ApplicationEntry::new`] but with an explicit matching name.
    pub fn with_name(
        name: impl Into<String>,
        display_name: impl Into<String>,
        path: impl Into<String>,
        launch_command: impl Into<String>,
        kind: AppKind,
    ) -> Option<Self> {
        let name = name.into().trim().to_lowercase();
        let launch_command = launch_command.into().trim().to_string();
        if name.is_empty() || launch_command.is_empty() {
            return None;
        }
        let display_name = display_name.into();
        let keywords = generate_keywords(&display_name, "");
        Some(Self {
            name,
            display_name,
            path: path.into(),
            launch_command,
            kind,
            description: String::new(),
            icon_path: String::new(),
            install_location: String::new(),
            publisher: String::new(),
            version: String::new(),
            keywords,
            last_launched_at: None,
        })
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the publisher and regenerates keywords to include it.
    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = publisher.into();
        self.keywords = generate_keywords(&self.display_name, &self.publisher);
        self
    }

    pub fn install_location(mut self, location: impl Into<String>) -> Self {
        self.install_location = location.into();
        self
    }

    pub fn icon_path(mut self, icon: impl Into<String>) -> Self {
        self.icon_path = icon.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Whether the entry satisfies the catalog invariant.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.launch_command.trim().is_empty()
    }

    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            name: self.name.clone(),
            path: self.path.to_lowercase(),
        }
    }

    /// File stem of the executable path, used to find running processes.
    /// Empty for URI paths and bare entries without a path.
    pub fn executable_stem(&self) -> String {
        if self.path.is_empty() || self.path.contains("://") {
            return String::new();
        }
        // System utilities store a bare command line such as `control.exe /name x`.
        let path = match self.kind {
            AppKind::SystemUtility => self.path.split_whitespace().next().unwrap_or_default(),
            _ => self.path.as_str(),
        };
        // Split on both separators so Windows paths work on any host.
        let base = path.rsplit(['/', '\\']).next().unwrap_or_default();
        Path::new(base)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Deduplication key: matching name plus case-folded path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub name: String,
    pub path: String,
}

static PARENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());
static BRACKETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\[[^\]]*\]").unwrap());
static VERSION_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*v?\d+\.[\d.]+.*$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Normalizes a display label into a matching name:
/// `"Mozilla Firefox (x64 en-US) 118.0.1"` becomes `"mozilla firefox"`.
pub fn clean_app_name(name: &str) -> String {
    let name = PARENS.replace_all(name, "");
    let name = BRACKETS.replace_all(&name, "");
    let name = VERSION_TAIL.replace(&name, "");
    let name = WHITESPACE.replace_all(&name, " ");
    name.trim().to_lowercase()
}

/// Search tokens for a display name and publisher. Tokens shorter than two
/// characters are dropped.
pub fn generate_keywords(name: &str, publisher: &str) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    let name_lc = name.to_lowercase();
    keywords.insert(name_lc.trim().to_string());

    let words: Vec<&str> = WORD.find_iter(&name_lc).map(|m| m.as_str()).collect();
    keywords.extend(words.iter().map(|w| w.to_string()));

    if !publisher.trim().is_empty() {
        let publisher_lc = publisher.to_lowercase();
        keywords.insert(publisher_lc.trim().to_string());
        keywords.extend(WORD.find_iter(&publisher_lc).map(|m| m.as_str().to_string()));
    }

    if words.len() > 1 {
        let initials: String = words.iter().filter_map(|w| w.chars().next()).collect();
        keywords.insert(initials);
    }

    keywords.retain(|k| k.chars().count() > 1);
    keywords
}
