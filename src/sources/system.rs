use crate::error::ScanError;
use crate::model::{AppKind, ApplicationEntry};
use crate::sources::Source;

/// (matching name, display name, command, description)
type SystemApp = (&'static str, &'static str, &'static str, &'static str);

const WINDOWS_APPS: [SystemApp; 9] = [
    ("notepad", "Notepad", "notepad.exe", "Text editor"),
    ("calculator", "Calculator", "calc.exe", "Calculator"),
    ("paint", "Paint", "mspaint.exe", "Image editor"),
    ("command prompt", "Command Prompt", "cmd.exe", "Command line interface"),
    ("powershell", "Windows PowerShell", "powershell.exe", "Advanced command line"),
    ("file explorer", "File Explorer", "explorer.exe", "File manager"),
    ("control panel", "Control Panel", "control.exe", "System settings"),
    ("system configuration", "System Configuration", "msconfig.exe", "System configuration utility"),
    ("task manager", "Task Manager", "taskmgr.exe", "Process manager"),
];

const UNIX_APPS: [SystemApp; 9] = [
    ("text editor", "Text Editor", "gnome-text-editor", "Text editor"),
    ("calculator", "Calculator", "gnome-calculator", "Calculator"),
    ("drawing", "Drawing", "drawing", "Image editor"),
    ("terminal", "Terminal", "x-terminal-emulator", "Command line interface"),
    ("xterm", "XTerm", "xterm", "Fallback terminal"),
    ("files", "Files", "nautilus", "File manager"),
    ("settings", "Settings", "gnome-control-center", "System settings"),
    ("display settings", "Display Settings", "gnome-control-center display", "Display configuration"),
    ("system monitor", "System Monitor", "gnome-system-monitor", "Process manager"),
];

/// Built-in OS tools. Always present, no I/O.
pub struct SystemSource;

impl SystemSource {
    fn table() -> &'static [SystemApp] {
        if cfg!(windows) { &WINDOWS_APPS } else { &UNIX_APPS }
    }

    fn publisher() -> &'static str {
        if cfg!(windows) { "Microsoft" } else { "" }
    }
}

impl Source for SystemSource {
    fn name(&self) -> &'static str {
        "System"
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        for &(name, display_name, command, description) in Self::table() {
            let entry = ApplicationEntry::with_name(name, display_name, command, command, AppKind::SystemUtility)
                .map(|e| e.description(description).publisher(Self::publisher()));
            out.extend(entry);
        }
        Ok(())
    }
}
