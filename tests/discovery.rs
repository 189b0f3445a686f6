use appctl::cache::CacheManager;
use appctl::error::ScanError;
use appctl::sources::{scan_all, Source};
use appctl::{AppKind, AppManager, ApplicationEntry, Catalog, Config};
use std::collections::BTreeSet;
use std::time::Duration;

/// Stands in for one installed-software source.
struct Listing {
    name: &'static str,
    apps: Vec<(&'static str, &'static str, AppKind, &'static str)>,
    fails: bool,
}

impl Source for Listing {
    fn name(&self) -> &'static str {
        self.name
    }

    fn scan(&self, out: &mut Vec<ApplicationEntry>) -> Result<(), ScanError> {
        if self.fails {
            return Err(ScanError::io(
                "/denied",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ));
        }
        for &(display, path, kind, description) in &self.apps {
            out.extend(ApplicationEntry::new(display, path, format!("\"{path}\""), kind).map(|e| e.description(description)));
        }
        Ok(())
    }
}

fn machine(include_broken: bool) -> Vec<Box<dyn Source>> {
    let mut sources: Vec<Box<dyn Source>> = vec![
        Box::new(Listing {
            name: "Registry",
            apps: vec![
                ("Mozilla Firefox (x64 en-US)", "/opt/firefox/firefox", AppKind::Executable, "Installed application by Mozilla"),
                ("GIMP 2.10.34", "/opt/gimp/bin/gimp", AppKind::Executable, "Installed application"),
            ],
            fails: false,
        }),
        Box::new(Listing {
            name: "StartMenu",
            apps: vec![
                ("Mozilla Firefox", "/OPT/FIREFOX/FIREFOX", AppKind::Shortcut, "StartMenu shortcut"),
                ("Inkscape", "/usr/bin/inkscape", AppKind::Shortcut, "StartMenu shortcut"),
            ],
            fails: false,
        }),
    ];
    if include_broken {
        sources.push(Box::new(Listing { name: "Store", apps: Vec::new(), fails: true }));
    }
    sources.push(Box::new(Listing {
        name: "System",
        apps: vec![("Calculator", "gnome-calculator", AppKind::SystemUtility, "Calculator")],
        fails: false,
    }));
    sources
}

fn keys(catalog: &Catalog) -> BTreeSet<(String, String)> {
    catalog
        .entries()
        .iter()
        .map(|e| (e.name.clone(), e.path.to_lowercase()))
        .collect()
}

#[test]
fn discovery_is_idempotent() {
    let first = Catalog::from_entries(scan_all(machine(false), Duration::from_secs(10)));
    let second = Catalog::from_entries(scan_all(machine(false), Duration::from_secs(10)));
    assert_eq!(keys(&first), keys(&second));
}

#[test]
fn duplicates_across_sources_collapse_to_one_key() {
    let catalog = Catalog::from_entries(scan_all(machine(false), Duration::from_secs(10)));
    assert_eq!(catalog.len(), 4);
    assert_eq!(keys(&catalog).len(), catalog.len());

    let firefox: Vec<_> = catalog.entries().iter().filter(|e| e.name == "mozilla firefox").collect();
    assert_eq!(firefox.len(), 1);
    assert_eq!(firefox[0].kind, AppKind::Executable);
    assert_eq!(firefox[0].description, "Installed application by Mozilla");

    let gimp = catalog.entries().iter().find(|e| e.path == "/opt/gimp/bin/gimp").unwrap();
    assert_eq!(gimp.name, "gimp");
}

#[test]
fn one_failing_source_does_not_cost_the_others() {
    let healthy = Catalog::from_entries(scan_all(machine(false), Duration::from_secs(10)));
    let with_failure = Catalog::from_entries(scan_all(machine(true), Duration::from_secs(10)));
    assert_eq!(keys(&healthy), keys(&with_failure));
}

#[test]
fn manager_rediscovers_when_the_cache_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("apps.json");
    std::fs::write(&cache_path, "not json at all").unwrap();

    let mut manager = AppManager::new(Config::default())
        .with_cache(CacheManager::new(Some(cache_path.clone()), chrono::Duration::hours(6)))
        .with_sources(|_| machine(true));
    assert_eq!(manager.discover().len(), 4);

    let written = std::fs::read_to_string(&cache_path).unwrap();
    assert!(written.contains("created_at"));
}
