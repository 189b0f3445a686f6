use crate::config::Config;
use crate::error::ScanError;
use crate::model::ApplicationEntry;
use log::{debug, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// One discovery source. Appends what it finds to `out`; an `Err` means
/// "nothing further from this source", entries already pushed are kept.
pub trait Source: Send {
    fn name(&self) -> &'static str;
    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError>;
}

pub mod desktop;
pub mod program_dirs;
pub mod registry;
pub mod shortcuts;
pub mod steam;
pub mod store;
pub mod system;

/// Sources enabled in `config`, in their fixed merge order.
pub fn configured_sources(config: &Config) -> Vec<Box<dyn Source>> {
    let toggles = &config.sources;
    let mut sources: Vec<Box<dyn Source>> = Vec::new();

    if toggles.registry {
        sources.push(Box::new(registry::RegistrySource::with_budget(
            config.discovery.registry_budget(),
        )));
    }
    if toggles.start_menu {
        sources.push(Box::new(shortcuts::ShortcutSource::start_menu()));
    }
    if toggles.program_dirs {
        sources.push(Box::new(program_dirs::ProgramDirsSource::with_extra_roots(
            toggles.extra_program_dirs.clone(),
        )));
    }
    if toggles.store {
        sources.push(Box::new(store::StoreSource::platform()));
    }
    if toggles.steam {
        sources.push(Box::new(steam::SteamSource::with_extra_libraries(
            toggles.extra_steam_libraries.clone(),
        )));
    }
    if toggles.desktop {
        sources.push(Box::new(shortcuts::ShortcutSource::desktop()));
    }
    if toggles.system {
        sources.push(Box::new(system::SystemSource));
    }
    sources
}

/// Runs every source on its own thread and concatenates their output in
/// source order. Errors and panics are logged and isolated to their source;
/// sources still running at `deadline` contribute nothing.
pub fn scan_all(sources: Vec<Box<dyn Source>>, deadline: Duration) -> Vec<ApplicationEntry> {
    let started = Instant::now();
    let total = sources.len();
    let names: Vec<&'static str> = sources.iter().map(|s| s.name()).collect();
    let (tx, rx) = mpsc::channel();

    for (index, source) in sources.into_iter().enumerate() {
        let tx = tx.clone();
        thread::spawn(move || {
            let mut found = Vec::new();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.scan(&mut found)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("{}: scan stopped early: {}", source.name(), e),
                Err(_) => warn!("{}: scan panicked", source.name()),
            }
            info!("{}: found {} entries", source.name(), found.len());
            let _ = tx.send((index, found));
        });
    }
    drop(tx);

    let mut results: Vec<Option<Vec<ApplicationEntry>>> = (0..total).map(|_| None).collect();
    let mut received = 0;
    while received < total {
        let remaining = deadline.saturating_sub(started.elapsed());
        match rx.recv_timeout(remaining) {
            Ok((index, found)) => {
                results[index] = Some(found);
                received += 1;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let late: Vec<_> = results
                    .iter()
                    .zip(&names)
                    .filter(|(r, _)| r.is_none())
                    .map(|(_, name)| *name)
                    .collect();
                warn!("discovery deadline of {:?} reached, skipping {:?}", deadline, late);
                break;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let entries: Vec<ApplicationEntry> = results.into_iter().flatten().flatten().collect();
    debug!("scanned {} sources in {:?}, {} raw entries", total, started.elapsed(), entries.len());
    entries
}


#[cfg(test)]
mod tests {
    use super::testing::FixedSource;
    use super::*;

    fn names(entries: &[ApplicationEntry]) -> Vec<String> {
        entries.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn output_follows_source_order_not_completion_order() {
        let mut slow = FixedSource::new("slow", &["alpha"]);
        slow.delay = Duration::from_millis(50);
        let fast = FixedSource::new("fast", &["beta"]);
        let entries = scan_all(vec![Box::new(slow), Box::new(fast)], Duration::from_secs(5));
        assert_eq!(names(&entries), vec!["alpha", "beta"]);
    }

    #[test]
    fn failing_source_does_not_block_others() {
        let mut denied = FixedSource::new("denied", &[]);
        denied.then_fail = true;
        let ok = FixedSource::new("ok", &["gimp", "inkscape"]);
        let entries = scan_all(vec![Box::new(denied), Box::new(ok)], Duration::from_secs(5));
        assert_eq!(names(&entries), vec!["gimp", "inkscape"]);
    }

    #[test]
    fn partial_output_before_an_error_or_panic_is_kept() {
        let mut failing = FixedSource::new("failing", &["one"]);
        failing.then_fail = true;
        let mut crashing = FixedSource::new("crashing", &["two"]);
        crashing.then_panic = true;
        let entries = scan_all(vec![Box::new(failing), Box::new(crashing)], Duration::from_secs(5));
        assert_eq!(names(&entries), vec!["one", "two"]);
    }

    #[test]
    fn sources_missing_the_deadline_are_skipped() {
        let mut stuck = FixedSource::new("stuck", &["late"]);
        stuck.delay = Duration::from_secs(3);
        let quick = FixedSource::new("quick", &["early"]);
        let started = Instant::now();
        let entries = scan_all(vec![Box::new(stuck), Box::new(quick)], Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(names(&entries), vec!["early"]);
    }

    #[test]
    fn disabled_sources_are_not_built() {
        let mut config = Config::default();
        config.sources.registry = false;
        config.sources.store = false;
        config.sources.steam = false;
        let built: Vec<_> = configured_sources(&config).iter().map(|s| s.name()).collect();
        assert_eq!(built, vec!["StartMenu", "ProgramDirs", "Desktop", "System"]);
    }
}
