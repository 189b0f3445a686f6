use crate::cache::CacheManager;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::launcher::{suggest, LaunchResult, Launcher, Spawner, Suggestion};
use crate::matcher::{FuzzyMatcher, MatchCandidate};
use crate::model::ApplicationEntry;
use crate::process::{self, ProcessControl};
use crate::sources::{configured_sources, scan_all, Source};
use crate::terminator::{CloseResult, Terminator};
use log::info;
use std::time::Instant;

type SourceFactory = Box<dyn Fn(&Config) -> Vec<Box<dyn Source>> + Send + Sync>;

/// Owns the catalog and wires discovery, matching, launching and closing
/// together. Constructing one does no I/O; call [`AppManager::discover`].
pub struct AppManager {
    config: Config,
    catalog: Catalog,
    cache: CacheManager,
    sources: SourceFactory,
    launcher: Launcher,
    terminator: Terminator,
}

impl AppManager {
    pub fn new(config: Config) -> Self {
        let cache = CacheManager::new(config.cache.resolved_path(), config.cache.ttl());
        let terminator = Terminator::new(process::system(), &config.terminate);
        Self {
            config,
            catalog: Catalog::default(),
            cache,
            sources: Box::new(configured_sources),
            launcher: Launcher::default(),
            terminator,
        }
    }

    pub fn with_sources(
        mut self,
        factory: impl Fn(&Config) -> Vec<Box<dyn Source>> + Send + Sync + 'static,
    ) -> Self {
        self.sources = Box::new(factory);
        self
    }

    pub fn with_cache(mut self, cache: CacheManager) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_spawner(mut self, spawner: Box<dyn Spawner>) -> Self {
        self.launcher = Launcher::new(spawner);
        self
    }

    pub fn with_process_control(mut self, control: Box<dyn ProcessControl>) -> Self {
        self.terminator = Terminator::new(control, &self.config.terminate);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Loads the cached catalog when it is fresh, otherwise rescans.
    pub fn discover(&mut self) -> &Catalog {
        match self.cache.load() {
            Some(catalog) => {
                self.catalog = catalog;
                &self.catalog
            }
            None => self.refresh(),
        }
    }

    /// Runs every enabled source, rebuilds the catalog and writes the cache.
    pub fn refresh(&mut self) -> &Catalog {
        let started = Instant::now();
        let sources = (self.sources)(&self.config);
        let raw = scan_all(sources, self.config.discovery.deadline());
        let raw_count = raw.len();
        self.catalog = Catalog::from_entries(raw);
        info!(
            "Discovered {} applications ({} before de-duplication) in {:?}",
            self.catalog.len(),
            raw_count,
            started.elapsed()
        );
        self.cache.save(&self.catalog);
        &self.catalog
    }

    fn threshold(&self, threshold: Option<u8>) -> u8 {
        threshold.unwrap_or(self.config.matching.threshold)
    }

    /// Ranked matches for `query`, best first.
    pub fn resolve(&self, query: &str, threshold: Option<u8>) -> Vec<MatchCandidate<'_>> {
        FuzzyMatcher::new(self.config.matching.max_results).resolve(&self.catalog, query, self.threshold(threshold))
    }

    pub fn suggestions(&self, query: &str) -> Vec<Suggestion> {
        suggest(&self.catalog, query, &self.config.matching)
    }

    /// The best match's full entry.
    pub fn info(&self, query: &str) -> Option<&ApplicationEntry> {
        self.resolve(query, None).into_iter().next().map(|hit| hit.entry)
    }

    pub fn list(&self, limit: usize) -> Vec<&ApplicationEntry> {
        self.catalog.list(limit)
    }

    pub fn launch_by_name(&mut self, query: &str, threshold: Option<u8>) -> LaunchResult {
        let threshold = self.threshold(threshold);
        self.launcher
            .launch_by_name(&mut self.catalog, query, threshold, &self.config.matching)
    }

    pub fn close_by_name(&self, query: &str, threshold: Option<u8>) -> CloseResult {
        self.terminator
            .close_by_name(&self.catalog, query, self.threshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::testing::RecordingSpawner;
    use crate::sources::testing::FixedSource;
    use crate::terminator::testing::{fast_config, Behaviour, FakeProcesses};
    use crate::terminator::CloseStatus;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manager(dir: &std::path::Path, scans: Arc<AtomicUsize>) -> AppManager {
        let config = Config { terminate: fast_config(), ..Config::default() };
        AppManager::new(config)
            .with_cache(CacheManager::new(Some(dir.join("apps.json")), Duration::hours(6)))
            .with_sources(move |_| {
                scans.fetch_add(1, Ordering::SeqCst);
                vec![
                    Box::new(FixedSource::new("A", &["notepad", "paint"])) as Box<dyn Source>,
                    Box::new(FixedSource::new("B", &["calculator", "notepad"])),
                ]
            })
            .with_spawner(Box::new(RecordingSpawner::default()))
    }

    #[test]
    fn construction_does_not_discover() {
        let dir = tempfile::tempdir().unwrap();
        let scans = Arc::new(AtomicUsize::new(0));
        let m = manager(dir.path(), scans.clone());
        assert!(m.catalog().is_empty());
        assert_eq!(scans.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn discover_uses_fresh_cache_and_refresh_bypasses_it() {
        let dir = tempfile::tempdir().unwrap();
        let scans = Arc::new(AtomicUsize::new(0));

        let mut first = manager(dir.path(), scans.clone());
        assert_eq!(first.discover().len(), 3);
        assert_eq!(scans.load(Ordering::SeqCst), 1);

        let mut second = manager(dir.path(), scans.clone());
        assert_eq!(second.discover(), first.catalog());
        assert_eq!(scans.load(Ordering::SeqCst), 1);

        second.refresh();
        assert_eq!(scans.load(Ordering::SeqCst), 2);
        assert_eq!(second.catalog(), first.catalog());
    }

    #[test]
    fn queries_run_against_the_discovered_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path(), Arc::new(AtomicUsize::new(0)));
        m.discover();

        assert_eq!(m.info("calculator").map(|e| e.display_name.as_str()), Some("calculator"));
        assert!(m.info("xyznotfound").is_none());
        assert_eq!(m.list(2).len(), 2);

        let launched = m.launch_by_name("notepad", None);
        assert!(launched.success, "{}", launched.message);
        let entry = m.info("notepad").unwrap();
        assert!(entry.last_launched_at.is_some());

        let missed = m.launch_by_name("notepad", Some(101));
        assert!(!missed.success);
    }

    #[test]
    fn close_goes_through_the_process_control() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manager(dir.path(), Arc::new(AtomicUsize::new(0))).with_process_control(Box::new(
            FakeProcesses::with(&[(4000, "notepad", Behaviour::IgnoresRequest)]),
        ));
        m.discover();
        let result = m.close_by_name("notepad", None);
        assert_eq!(result.status, CloseStatus::Closed);
        assert_eq!(result.closed_processes, vec!["notepad"]);
    }
}
