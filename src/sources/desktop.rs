//! Parser for freedesktop `.desktop` launchers, the shortcut format on Linux
//! and BSD desktops.

use crate::platform::split_command;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesktopFile {
    pub name: String,
    /// Exec line with field codes (`%f`, `%U`, ...) removed.
    pub exec: String,
    pub comment: Option<String>,
    pub icon: Option<String>,
    /// Working directory from the `Path=` key.
    pub working_dir: Option<String>,
}

impl DesktopFile {
    /// Program and remaining arguments of the Exec line.
    pub fn program_and_args(&self) -> Option<(String, Vec<String>)> {
        let mut parts = split_command(&self.exec).into_iter();
        let program = parts.next()?;
        Some((program, parts.collect()))
    }
}

/// Parses the `[Desktop Entry]` group. Hidden, `NoDisplay` and non-application
/// entries yield `None`.
pub fn parse_desktop_file(content: &str) -> Option<DesktopFile> {
    let mut file = DesktopFile::default();
    let mut name = None;
    let mut exec = None;
    let mut no_display = false;
    let mut is_application = true;
    let mut is_desktop_entry = false;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') { continue; }

        if line == "[Desktop Entry]" {
            is_desktop_entry = true;
            continue;
        }

        if line.starts_with('[') {
            is_desktop_entry = false;
            continue;
        }

        if !is_desktop_entry { continue; }

        let Some((key, value)) = line.split_once('=') else { continue };
        let value = value.trim();
        match key.trim() {
            "Name" => name = Some(value.to_string()),
            "Exec" => {
                let clean_exec: String = value
                    .split_whitespace()
                    .filter(|s| !s.starts_with('%'))
                    .collect::<Vec<_>>()
                    .join(" ");
                exec = Some(clean_exec);
            }
            "Comment" => file.comment = Some(value.to_string()),
            "Icon" => file.icon = Some(value.to_string()),
            "Path" if !value.is_empty() => file.working_dir = Some(value.to_string()),
            "NoDisplay" | "Hidden" => no_display |= value == "true",
            "Type" => is_application = value == "Application",
            _ => {}
        }
    }

    if no_display || !is_application { return None; }

    match (name, exec) {
        (Some(n), Some(e)) if !e.is_empty() => {
            file.name = n;
            file.exec = e;
            Some(file)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_main_group_only() {
        let content = "\
# comment
[Desktop Entry]
Type=Application
Name=Firefox
Name[de]=Firefox Browser
Comment=Browse the Web
Exec=/usr/lib/firefox/firefox %u
Icon=firefox
Path=/usr/lib/firefox

[Desktop Action new-window]
Name=New Window
Exec=/usr/lib/firefox/firefox --new-window
";
        let file = parse_desktop_file(content).unwrap();
        assert_eq!(file.name, "Firefox");
        assert_eq!(file.exec, "/usr/lib/firefox/firefox");
        assert_eq!(file.comment.as_deref(), Some("Browse the Web"));
        assert_eq!(file.working_dir.as_deref(), Some("/usr/lib/firefox"));
        assert_eq!(file.icon.as_deref(), Some("firefox"));
        assert_eq!(
            file.program_and_args(),
            Some(("/usr/lib/firefox/firefox".to_string(), vec![]))
        );
    }

    #[test]
    fn hidden_links_and_incomplete_entries_are_skipped() {
        assert!(parse_desktop_file("[Desktop Entry]\nName=A\nExec=a\nNoDisplay=true\n").is_none());
        assert!(parse_desktop_file("[Desktop Entry]\nName=A\nExec=a\nHidden=true\n").is_none());
        assert!(parse_desktop_file("[Desktop Entry]\nType=Link\nName=A\nURL=https://x\n").is_none());
        assert!(parse_desktop_file("[Desktop Entry]\nName=A\n").is_none());
        assert!(parse_desktop_file("[Desktop Entry]\nName=A\nExec=%F\n").is_none());
    }

    #[test]
    fn arguments_survive_field_code_removal() {
        let file = parse_desktop_file("[Desktop Entry]\nName=Code\nExec=code --new-window %F\n").unwrap();
        assert_eq!(
            file.program_and_args(),
            Some(("code".to_string(), vec!["--new-window".to_string()]))
        );
    }
}
