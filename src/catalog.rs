use crate::model::{AppKind, ApplicationEntry, IdentityKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Synthetic catalog id. Only meaningful within one discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppId(pub usize);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app_{}", self.0)
    }
}

/// De-duplicated set of applications from one discovery pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Vec<ApplicationEntry>,
}

impl Catalog {
    /// Merges raw scanner output. Invalid entries are dropped and each
    /// identity key keeps a single entry: the challenger replaces the
    /// incumbent when its description is longer, or equally long while the
    /// incumbent is a shortcut and the challenger is not.
    pub fn from_entries(raw: impl IntoIterator<Item = ApplicationEntry>) -> Self {
        let mut entries: Vec<ApplicationEntry> = Vec::new();
        let mut positions: HashMap<IdentityKey, usize> = HashMap::new();

        for entry in raw {
            if !entry.is_valid() {
                continue;
            }
            match positions.get(&entry.identity()) {
                Some(&pos) => {
                    if supersedes(&entry, &entries[pos]) {
                        entries[pos] = entry;
                    }
                }
                None => {
                    positions.insert(entry.identity(), entries.len());
                    entries.push(entry);
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: AppId) -> Option<&ApplicationEntry> {
        self.entries.get(id.0)
    }

    pub fn get_mut(&mut self, id: AppId) -> Option<&mut ApplicationEntry> {
        self.entries.get_mut(id.0)
    }

    /// Entries with their ids, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (AppId, &ApplicationEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (AppId(i), e))
    }

    pub fn entries(&self) -> &[ApplicationEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ApplicationEntry> {
        self.entries
    }

    /// Entries sorted by display name, case-insensitively, capped at `limit`.
    pub fn list(&self, limit: usize) -> Vec<&ApplicationEntry> {
        let mut sorted: Vec<&ApplicationEntry> = self.entries.iter().collect();
        sorted.sort_by_cached_key(|e| e.display_name.to_lowercase());
        sorted.truncate(limit);
        sorted
    }
}

fn supersedes(challenger: &ApplicationEntry, incumbent: &ApplicationEntry) -> bool {
    let (new_len, old_len) = (challenger.description.len(), incumbent.description.len());
    new_len > old_len
        || (new_len == old_len
            && incumbent.kind == AppKind::Shortcut
            && challenger.kind != AppKind::Shortcut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, path: &str, kind: AppKind, description: &str) -> ApplicationEntry {
        ApplicationEntry::new(name, path, format!("\"{path}\""), kind)
            .unwrap()
            .description(description)
    }

    #[test]
    fn same_key_from_two_sources_is_merged() {
        let catalog = Catalog::from_entries(vec![
            entry("Firefox", "/usr/bin/firefox", AppKind::Shortcut, "StartMenu shortcut"),
            entry("Firefox", "/USR/BIN/FIREFOX", AppKind::Executable, "Installed application"),
            entry("Firefox", "/opt/firefox/firefox", AppKind::Executable, ""),
        ]);
        assert_eq!(catalog.len(), 2);
        let first = catalog.get(AppId(0)).unwrap();
        assert_eq!(first.kind, AppKind::Executable);
        assert_eq!(first.description, "Installed application");
    }

    #[test]
    fn longer_description_wins_over_kind() {
        let catalog = Catalog::from_entries(vec![
            entry("Gimp", "/usr/bin/gimp", AppKind::Executable, "Installed"),
            entry("Gimp", "/usr/bin/gimp", AppKind::Shortcut, "GNU Image Manipulation Program"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].kind, AppKind::Shortcut);
    }

    #[test]
    fn tie_break_does_not_depend_on_arrival_order() {
        let shortcut = entry("Vlc", "/usr/bin/vlc", AppKind::Shortcut, "same");
        let exe = entry("Vlc", "/usr/bin/vlc", AppKind::Executable, "same");
        let a = Catalog::from_entries(vec![shortcut.clone(), exe.clone()]);
        let b = Catalog::from_entries(vec![exe, shortcut]);
        assert_eq!(a.entries()[0].kind, AppKind::Executable);
        assert_eq!(b.entries()[0].kind, AppKind::Executable);
    }

    #[test]
    fn invalid_entries_never_enter_the_catalog() {
        let mut broken = entry("Tool", "/x/tool", AppKind::Executable, "");
        broken.launch_command.clear();
        let catalog = Catalog::from_entries(vec![broken]);
        assert!(catalog.is_empty());
    }

    #[test]
    fn ids_are_sequential_and_list_sorts_by_display_name() {
        let catalog = Catalog::from_entries(vec![
            entry("zed", "/z", AppKind::Executable, ""),
            entry("Alacritty", "/a", AppKind::Executable, ""),
            entry("blender", "/b", AppKind::Executable, ""),
        ]);
        let ids: Vec<String> = catalog.iter().map(|(id, _)| id.to_string()).collect();
        assert_eq!(ids, vec!["app_0", "app_1", "app_2"]);
        let listed: Vec<&str> = catalog.list(2).iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(listed, vec!["Alacritty", "blender"]);
    }
}
