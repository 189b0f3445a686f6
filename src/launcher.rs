use crate::catalog::Catalog;
use crate::config::MatchingConfig;
use crate::error::LaunchError;
use crate::matcher::FuzzyMatcher;
use crate::model::ApplicationEntry;
use crate::platform::{opener_for, split_command};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Fully resolved process start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

pub trait Spawner: Send + Sync {
    fn spawn(&self, plan: &LaunchPlan) -> Result<(), LaunchError>;
}

/// Starts programs detached from our stdio and process group.
pub struct DetachedSpawner;

impl Spawner for DetachedSpawner {
    fn spawn(&self, plan: &LaunchPlan) -> Result<(), LaunchError> {
        let mut command = Command::new(&plan.program);
        command
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &plan.working_dir {
            command.current_dir(dir);
        }
        detach(&mut command);

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: plan.program.clone(),
            source,
        })?;
        // Reap the child whenever it exits so it never lingers as a zombie.
        thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// Builds the start request for an entry. URIs and folders go through the
/// desktop opener; installed programs run from their install directory when
/// both it and the program exist.
pub fn plan_for(entry: &ApplicationEntry) -> Result<LaunchPlan, LaunchError> {
    let mut parts = split_command(&entry.launch_command).into_iter();
    let program = parts.next().filter(|p| !p.is_empty()).ok_or(LaunchError::EmptyCommand)?;
    let args: Vec<String> = parts.collect();

    if args.is_empty() && (program.contains("://") || Path::new(&program).is_dir()) {
        let (program, args) = opener_for(&program);
        return Ok(LaunchPlan { program, args, working_dir: None });
    }

    let working_dir = if entry.kind.launches_directly() {
        None
    } else if Path::new(&entry.path).exists()
        && !entry.install_location.is_empty()
        && Path::new(&entry.install_location).is_dir()
    {
        Some(PathBuf::from(&entry.install_location))
    } else {
        // Missing path: try the command verbatim, it may be on PATH.
        None
    };

    Ok(LaunchPlan { program, args, working_dir })
}

/// A near miss offered when nothing cleared the normal threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub score: u8,
    pub path: String,
}

/// Outcome of [`Launcher::launch_by_name`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchResult {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    pub suggestions: Vec<Suggestion>,
    pub message: String,
}

pub struct Launcher {
    spawner: Box<dyn Spawner>,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new(Box::new(DetachedSpawner))
    }
}

impl Launcher {
    pub fn new(spawner: Box<dyn Spawner>) -> Self {
        Self { spawner }
    }

    /// Starts `entry` and stamps `last_launched_at` on success.
    pub fn launch(&self, entry: &mut ApplicationEntry) -> Result<(), LaunchError> {
        info!("Launching {}...", entry.display_name);
        let plan = plan_for(entry)?;
        self.spawner.spawn(&plan)?;
        entry.last_launched_at = Some(Utc::now());
        info!("Launched {} ({} {:?})", entry.display_name, plan.program, plan.args);
        Ok(())
    }

    /// Resolves `query` and launches the best match. With no match, up to
    /// `max_suggestions` entries above the suggestion threshold are returned.
    pub fn launch_by_name(
        &self,
        catalog: &mut Catalog,
        query: &str,
        threshold: u8,
        matching: &MatchingConfig,
    ) -> LaunchResult {
        let matcher = FuzzyMatcher::new(matching.max_results);
        let best = matcher
            .resolve(catalog, query, threshold)
            .first()
            .map(|hit| (hit.id, hit.score));

        let Some(entry) = best.and_then(|(id, _)| catalog.get_mut(id)) else {
            let suggestions = suggest(catalog, query, matching);
            return LaunchResult {
                success: false,
                query: query.to_string(),
                resolved_name: None,
                path: None,
                score: None,
                suggestions,
                message: format!("No application found matching '{query}'"),
            };
        };
        let score = best.map(|(_, score)| score);

        let (success, message) = match self.launch(entry) {
            Ok(()) => (true, format!("Launched {}", entry.display_name)),
            Err(e) => {
                warn!("Failed to launch {}: {}", entry.display_name, e);
                (false, format!("Failed to launch {}: {}", entry.display_name, e))
            }
        };

        LaunchResult {
            success,
            query: query.to_string(),
            resolved_name: Some(entry.display_name.clone()),
            path: Some(entry.path.clone()),
            score,
            suggestions: Vec::new(),
            message,
        }
    }
}

/// Lower-threshold matches for "did you mean" listings.
pub fn suggest(catalog: &Catalog, query: &str, matching: &MatchingConfig) -> Vec<Suggestion> {
    FuzzyMatcher::new(matching.max_results)
        .resolve(catalog, query, matching.suggestion_threshold)
        .into_iter()
        .take(matching.max_suggestions)
        .map(|hit| Suggestion {
            name: hit.entry.display_name.clone(),
            score: hit.score,
            path: hit.entry.path.clone(),
        })
        .collect()
}
