//! Small OS helpers shared by the sources, the launcher and the process table.

use crate::error::ScanError;
use log::debug;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs a program to completion and returns its stdout, killing it once
/// `timeout` has passed.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String, ScanError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ScanError::Subprocess {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

    // Drain stdout on a separate thread so a chatty child never blocks on a
    // full pipe while we poll for its exit.
    let mut stdout = child.stdout.take();
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(out) = stdout.as_mut() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                // A grandchild may still hold the pipe open; leave the reader behind.
                drop(reader);
                return Err(ScanError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(ScanError::Subprocess {
                    program: program.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    };

    let output = reader.join().unwrap_or_default();
    if !status.success() {
        return Err(ScanError::Subprocess {
            program: program.to_string(),
            reason: format!("exited with {status}"),
        });
    }
    debug!("{program} finished in {:?}", started.elapsed());
    Ok(String::from_utf8_lossy(&output).into_owned())
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match path.metadata() {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}

/// Executables under `dir`, at most `max_depth` directories below it,
/// shallowest first, capped at `limit`.
pub fn find_executables(dir: &Path, max_depth: usize, limit: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for depth in 1..=max_depth + 1 {
        let mut level: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(depth)
            .max_depth(depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| is_executable(p))
            .collect();
        level.sort();
        found.extend(level);
        if found.len() >= limit {
            found.truncate(limit);
            break;
        }
    }
    found
}

/// Program and arguments that hand a URI (or a folder) to the desktop's
/// default handler.
pub fn opener_for(target: &str) -> (String, Vec<String>) {
    if cfg!(windows) {
        let args = ["/C", "start", "", target].map(String::from).to_vec();
        ("cmd".to_string(), args)
    } else if cfg!(target_os = "macos") {
        ("open".to_string(), vec![target.to_string()])
    } else {
        ("xdg-open".to_string(), vec![target.to_string()])
    }
}

/// Splits a command line on whitespace, keeping double-quoted runs together
/// and dropping the quotes: `"C:\Program Files\x.exe" -a` gives two parts.
pub fn split_command(command: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in command.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    parts.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        parts.push(current);
    }
    parts
}

/// Wraps a path in double quotes for use in a launch command.
pub fn quote(path: &str) -> String {
    format!("\"{path}\"")
}

pub fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn split_command_honours_quotes() {
        assert_eq!(
            split_command(r#""C:\Program Files\App\app.exe" --profile "My Profile""#),
            vec![r"C:\Program Files\App\app.exe", "--profile", "My Profile"]
        );
        assert_eq!(split_command("  notepad.exe  "), vec!["notepad.exe"]);
        assert_eq!(split_command(r#"run """#), vec!["run", ""]);
        assert!(split_command("   ").is_empty());
    }

    #[cfg(unix)]
    fn make_exe(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn find_executables_respects_depth_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b/c");
        fs::create_dir_all(&deep).unwrap();
        make_exe(&dir.path().join("top"));
        make_exe(&dir.path().join("a/one"));
        make_exe(&dir.path().join("a/b/two"));
        make_exe(&deep.join("three"));
        fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let found = find_executables(dir.path(), 2, 10);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["top", "one", "two"]);

        assert_eq!(find_executables(dir.path(), 2, 2).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn run_with_timeout_returns_stdout_and_kills_slow_children() {
        let out = run_with_timeout("sh", &["-c", "echo hello"], Duration::from_secs(5)).unwrap();
        assert_eq!(out.trim(), "hello");

        let err = run_with_timeout("sh", &["-c", "exec sleep 5"], Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, ScanError::Timeout { .. }));

        let err = run_with_timeout("sh", &["-c", "exit 3"], Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ScanError::Subprocess { .. }));
    }
}
