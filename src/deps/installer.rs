//! Dependency installer.
//!
//! Scans compiled sources for imports, installs unknown packages one at a
//! time and keeps the package bundle in sync:
//!
//! ```text
//! scan(f) ──► gate held? ──yes──► defer until the holder admits it
//!               │no
//!               ▼
//!        unknown = external − installed
//!               │
//!     empty ────┴──── non-empty
//!       │                 │ acquire gate
//!     record          install each (sequential, failures isolated)
//!                         │ record successes
//!                         │ admit deferred scans (FIFO), installing theirs
//!                         │ persist manifest + loader, run bundler
//!                         ▼ (rollback manifest on bundler failure)
//!                      release gate
//! ```
//!
//! The very first scan of the process never bundles; `complete_initial_build`
//! catches up once the initial pass is over.

use super::{
    BundleError, BundleRequest, Bundler, DependencySet, InstallError, Manifest, ManifestSnapshot,
    PackageManager,
    gate::InstallGate,
    scan::scan_source,
};
use crate::bus::{BusMessage, Notifier};
use crate::logger::{status_error, status_success};
use crate::utils::path::clean_relative;
use crate::{debug, log};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::oneshot;

/// Packages the page runtime provides itself.
pub const DEFAULT_EXCLUDE: &[&str] = &["flint-js", "react", "react-dom"];

/// What happened to the bundle as part of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
    /// Nothing new to bundle.
    Skipped,
    /// New packages recorded during the first scan; bundling deferred to
    /// `complete_initial_build`.
    Suppressed,
    /// Another scan holds the gate and will bundle.
    Pending,
    Bundled { packages: usize },
    Failed(String),
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub file: String,
    pub internal: Vec<String>,
    pub external: Vec<String>,
    /// Packages this scan installed.
    pub installed: Vec<String>,
    /// Packages whose install failed.
    pub failed: Vec<String>,
    /// Whether the scan waited behind another scan's install.
    pub deferred: bool,
    pub bundled: BundleOutcome,
}

impl ScanReport {
    fn new(file: &str, deps: &DependencySet) -> Self {
        Self {
            file: file.to_string(),
            internal: deps.internal.clone(),
            external: deps.external.clone(),
            installed: Vec::new(),
            failed: Vec::new(),
            deferred: false,
            bundled: BundleOutcome::Skipped,
        }
    }
}

/// Installer settings.
#[derive(Debug, Clone)]
pub struct InstallerOptions {
    /// Never installed nor loaded.
    pub exclude: Vec<String>,
    /// Passed to the bundler as globals (`react` → `React`).
    pub externals: BTreeMap<String, String>,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            externals: BTreeMap::from([
                ("react".to_string(), "React".to_string()),
                ("bluebird".to_string(), "_bluebird".to_string()),
            ]),
        }
    }
}

// ============================================================================
// State
// ============================================================================

struct DeferredScan {
    file: String,
    deps: DependencySet,
    reply: oneshot::Sender<ScanReport>,
}

/// Bookkeeping of the current gate hold, for rollback.
struct Hold {
    snapshot: Option<ManifestSnapshot>,
    /// Recorded packages at open, for when the snapshot is missing.
    packages: BTreeSet<String>,
    /// Packages newly installed since the snapshot.
    installed: Vec<String>,
    dirty_before: bool,
}

struct InstallerState {
    gate: InstallGate<DeferredScan>,
    manifest: Manifest,
    externals_by_file: FxHashMap<String, Vec<String>>,
    /// Module ids (no extension) each file imports relatively.
    internals_by_file: FxHashMap<String, Vec<String>>,
    first_scan: bool,
    /// A package was recorded since the last bundle.
    dirty: bool,
    hold: Option<Hold>,
}

impl InstallerState {
    fn is_installed(&self, name: &str) -> bool {
        self.manifest.contains(name)
            || self
                .externals_by_file
                .values()
                .any(|names| names.iter().any(|n| n == name))
    }

    fn installed_set(&self) -> BTreeSet<String> {
        let mut set = self.manifest.packages().clone();
        for names in self.externals_by_file.values() {
            set.extend(names.iter().cloned());
        }
        set
    }

    fn open_hold(&mut self) {
        let snapshot = match self.manifest.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log!("npm"; "cannot snapshot manifest, rollback disabled: {}", e);
                None
            }
        };
        self.hold = Some(Hold {
            snapshot,
            packages: self.manifest.packages().clone(),
            installed: Vec::new(),
            dirty_before: self.dirty,
        });
    }
}

enum Admission {
    Recorded(ScanReport),
    Install(InstallJob),
}

struct InstallJob {
    file: String,
    deps: DependencySet,
    unknown: Vec<String>,
}

enum Plan {
    Done(ScanReport),
    Deferred(oneshot::Receiver<ScanReport>),
    Install(InstallJob, bool),
}

// ============================================================================
// Installer
// ============================================================================

/// Coordinates scans, installs and bundling. Cheap to clone.
#[derive(Clone)]
pub struct DependencyInstaller {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<InstallerState>,
    manager: Arc<dyn PackageManager>,
    bundler: Arc<dyn Bundler>,
    notifier: Arc<dyn Notifier>,
    exclude: FxHashSet<String>,
    externals: BTreeMap<String, String>,
}

impl DependencyInstaller {
    pub fn new(
        manifest: Manifest,
        manager: Arc<dyn PackageManager>,
        bundler: Arc<dyn Bundler>,
        notifier: Arc<dyn Notifier>,
        options: InstallerOptions,
    ) -> Self {
        let state = InstallerState {
            gate: InstallGate::default(),
            manifest,
            externals_by_file: FxHashMap::default(),
            internals_by_file: FxHashMap::default(),
            first_scan: true,
            dirty: false,
            hold: None,
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                manager,
                bundler,
                notifier,
                exclude: options.exclude.into_iter().collect(),
                externals: options.externals,
            }),
        }
    }

    /// Scan `source` of `file` and install whatever it imports that is not
    /// installed yet.
    pub async fn scan(&self, file: &str, source: &str) -> ScanReport {
        let deps = scan_source(source);

        let plan = {
            let mut state = self.inner.state.lock();
            if state.gate.is_held() {
                let (reply, rx) = oneshot::channel();
                state.gate.defer(DeferredScan {
                    file: file.to_string(),
                    deps,
                    reply,
                });
                Plan::Deferred(rx)
            } else {
                let first = std::mem::replace(&mut state.first_scan, false);
                match self.admit(&mut state, file, deps) {
                    Admission::Recorded(report) => Plan::Done(report),
                    Admission::Install(job) => {
                        state.gate.acquire();
                        state.open_hold();
                        Plan::Install(job, first)
                    }
                }
            }
        };

        match plan {
            Plan::Done(report) => report,
            Plan::Deferred(rx) => {
                debug!("npm"; "{} waits for running install", file);
                match rx.await {
                    Ok(report) => report,
                    // holder went away; report what was found
                    Err(_) => {
                        let mut report = ScanReport::new(file, &scan_source(source));
                        report.deferred = true;
                        report
                    }
                }
            }
            Plan::Install(job, first) => {
                let mut report = self.install(job).await;
                report.bundled = self.drain_hold(first).await;
                report
            }
        }
    }

    /// Diff against the installed set; record right away when nothing is
    /// missing.
    fn admit(&self, state: &mut InstallerState, file: &str, deps: DependencySet) -> Admission {
        let internals = deps
            .internal
            .iter()
            .map(|spec| module_id(&clean_relative(file, spec)).to_string())
            .collect();
        state.internals_by_file.insert(file.to_string(), internals);

        let unknown: Vec<_> = deps
            .external
            .iter()
            .filter(|name| !self.inner.exclude.contains(*name) && !state.is_installed(name))
            .cloned()
            .collect();

        if unknown.is_empty() {
            let record = self.recordable(&deps, &[]);
            state.externals_by_file.insert(file.to_string(), record);
            return Admission::Recorded(ScanReport::new(file, &deps));
        }

        Admission::Install(InstallJob {
            file: file.to_string(),
            deps,
            unknown,
        })
    }

    /// Externals worth recording: not excluded, not failed.
    fn recordable(&self, deps: &DependencySet, failed: &[String]) -> Vec<String> {
        deps.external
            .iter()
            .filter(|name| !self.inner.exclude.contains(*name) && !failed.contains(name))
            .cloned()
            .collect()
    }

    /// Install `job.unknown` one by one. Caller holds the gate.
    async fn install(&self, job: InstallJob) -> ScanReport {
        let mut installed = Vec::new();
        let mut failed = Vec::new();

        for name in &job.unknown {
            self.notify(BusMessage::PackageInstall { name: name.clone() });
            log!("npm"; "installing {}", name);

            let manager = Arc::clone(&self.inner.manager);
            let package = name.clone();
            let result = tokio::task::spawn_blocking(move || manager.install(&package))
                .await
                .unwrap_or_else(|_| Err(InstallError::Aborted(name.clone())));

            match result {
                Ok(()) => {
                    self.notify(BusMessage::PackageInstalled { name: name.clone() });
                    status_success(&format!("installed {name}"));
                    installed.push(name.clone());
                }
                Err(e) => {
                    status_error(&format!("install failed: {name}"), &e.to_string());
                    self.notify(BusMessage::package_error(name, e.to_string()));
                    failed.push(name.clone());
                }
            }
        }

        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let record = self.recordable(&job.deps, &failed);
            state.externals_by_file.insert(job.file.clone(), record);
            if !installed.is_empty() {
                state.dirty = true;
                if let Some(hold) = state.hold.as_mut() {
                    hold.installed.extend(installed.iter().cloned());
                }
            }
        }

        let mut report = ScanReport::new(&job.file, &job.deps);
        report.installed = installed;
        report.failed = failed;
        report
    }

    /// Admit deferred scans, bundle, release. Loops when scans arrive while
    /// bundling, so nothing is left behind a released gate.
    async fn drain_hold(&self, suppress_bundle: bool) -> BundleOutcome {
        loop {
            let mut replies = Vec::new();
            while let Some((scan, admission)) = self.next_admission() {
                let mut report = match admission {
                    Admission::Recorded(report) => report,
                    Admission::Install(job) => self.install(job).await,
                };
                report.deferred = true;
                replies.push((scan.reply, report));
            }

            let dirty = self.inner.state.lock().dirty;
            let outcome = match (dirty, suppress_bundle) {
                (false, _) => BundleOutcome::Skipped,
                (true, true) => {
                    debug!("bundle"; "first scan, bundle deferred to end of initial build");
                    BundleOutcome::Suppressed
                }
                (true, false) => self.regenerate().await,
            };

            for (reply, mut report) in replies {
                report.bundled = outcome.clone();
                let _ = reply.send(report);
            }

            let mut state = self.inner.state.lock();
            if state.gate.release() {
                state.hold = None;
                return outcome;
            }
        }
    }

    fn next_admission(&self) -> Option<(DeferredScan, Admission)> {
        let mut state = self.inner.state.lock();
        let scan = state.gate.next_deferred()?;
        let admission = self.admit(&mut state, &scan.file, scan.deps.clone());
        Some((scan, admission))
    }

    /// Persist the installed set, regenerate loader and bundle. Caller
    /// holds the gate.
    async fn regenerate(&self) -> BundleOutcome {
        let prepared = {
            let mut state = self.inner.state.lock();
            let packages: BTreeSet<_> = state
                .installed_set()
                .into_iter()
                .filter(|name| !self.inner.exclude.contains(name))
                .collect();
            let count = packages.len();
            state
                .manifest
                .persist(packages)
                .map(|()| (self.bundle_request(&state.manifest), count))
                .map_err(BundleError::from)
        };

        let result = match prepared {
            Ok((request, count)) => {
                log!("bundle"; "bundling {} package(s)", count);
                let bundler = Arc::clone(&self.inner.bundler);
                tokio::task::spawn_blocking(move || bundler.bundle(&request))
                    .await
                    .unwrap_or(Err(BundleError::Aborted))
                    .and_then(|()| {
                        self.inner
                            .state
                            .lock()
                            .manifest
                            .promote_bundle()
                            .map_err(BundleError::from)
                    })
                    .map(|()| count)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(count) => {
                {
                    let mut state = self.inner.state.lock();
                    state.dirty = false;
                    // later bundles in this hold roll back to here
                    state.open_hold();
                }
                status_success(&format!("bundled {count} package(s)"));
                self.notify(BusMessage::PackagesReload);
                BundleOutcome::Bundled { packages: count }
            }
            Err(e) => {
                self.rollback();
                status_error("bundle failed, previous bundle kept", &e.to_string());
                self.notify(BusMessage::NpmError {
                    error: e.to_string(),
                });
                BundleOutcome::Failed(e.to_string())
            }
        }
    }

    /// Undo everything recorded since the hold's snapshot.
    fn rollback(&self) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        let Some(hold) = state.hold.as_mut() else {
            return;
        };

        let installed = std::mem::take(&mut hold.installed);
        for names in state.externals_by_file.values_mut() {
            names.retain(|name| !installed.contains(name));
        }
        let restored = match hold.snapshot.take() {
            Some(snapshot) => state.manifest.restore(snapshot),
            None => state
                .manifest
                .reset_packages(std::mem::take(&mut hold.packages)),
        };
        if let Err(e) = restored {
            log!("error"; "manifest rollback failed: {}", e);
        }
        state.manifest.discard_staging();
        state.dirty = hold.dirty_before;
        state.open_hold();
    }

    fn bundle_request(&self, manifest: &Manifest) -> BundleRequest {
        let paths = manifest.paths();
        BundleRequest {
            entry: paths.loader.clone(),
            output: paths.staging.clone(),
            config: paths.bundler_config.clone(),
            externals: self.inner.externals.clone(),
        }
    }

    /// Bundle whatever was recorded while bundling was suppressed.
    pub async fn complete_initial_build(&self) -> BundleOutcome {
        {
            let mut state = self.inner.state.lock();
            state.first_scan = false;
            if state.gate.is_held() {
                return BundleOutcome::Pending;
            }
            if !state.dirty {
                return BundleOutcome::Skipped;
            }
            state.gate.acquire();
            state.open_hold();
        }
        self.drain_hold(false).await
    }

    /// Regenerate manifest, loader and bundle unconditionally.
    pub async fn rebundle(&self) -> BundleOutcome {
        self.inner.state.lock().dirty = true;
        self.complete_initial_build().await
    }

    /// Drop the records of a deleted file. Its packages stay in the manifest.
    pub fn forget(&self, file: &str) {
        let mut state = self.inner.state.lock();
        state.externals_by_file.remove(file);
        state.internals_by_file.remove(file);
    }

    /// Whether another scanned file imports `file` relatively.
    pub fn is_internal(&self, file: &str) -> bool {
        let id = module_id(file);
        let state = self.inner.state.lock();
        state
            .internals_by_file
            .iter()
            .any(|(importer, ids)| importer != file && ids.iter().any(|i| i == id))
    }

    /// Current installed set (manifest plus every file's records).
    pub fn installed(&self) -> BTreeSet<String> {
        self.inner.state.lock().installed_set()
    }

    /// Scans waiting behind the current install.
    pub fn pending_scans(&self) -> usize {
        self.inner.state.lock().gate.deferred_len()
    }

    pub fn is_installing(&self) -> bool {
        self.inner.state.lock().gate.is_held()
    }

    fn notify(&self, message: BusMessage) {
        self.inner.notifier.notify(message);
    }
}

/// Path without its extension (`views/main.js` → `views/main`).
fn module_id(file: &str) -> &str {
    let name_start = file.rfind('/').map_or(0, |i| i + 1);
    match file[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &file[..name_start + dot],
        _ => file,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingNotifier;
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeNpm {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
        /// Blocks every install until a go signal arrives.
        go: Option<Mutex<mpsc::Receiver<()>>>,
        active: AtomicUsize,
        overlapped: AtomicBool,
        /// Directory removed by the next install.
        removes_dir: Mutex<Option<std::path::PathBuf>>,
    }

    impl FakeNpm {
        fn failing(names: &[&str]) -> Self {
            Self {
                failing: names.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        fn blocking() -> (Self, mpsc::Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let npm = Self {
                go: Some(Mutex::new(rx)),
                ..Default::default()
            };
            (npm, tx)
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl PackageManager for FakeNpm {
        fn install(&self, name: &str) -> Result<(), InstallError> {
            self.calls.lock().push(name.to_string());
            if let Some(dir) = self.removes_dir.lock().take() {
                let _ = fs::remove_dir_all(dir);
            }
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            match &self.go {
                Some(go) => {
                    let _ = go.lock().recv_timeout(Duration::from_secs(5));
                }
                None => std::thread::sleep(Duration::from_millis(2)),
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.failing.iter().any(|f| f == name) {
                return Err(InstallError::Failed {
                    name: name.to_string(),
                    reason: "E404".into(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBundler {
        runs: AtomicUsize,
        fail: AtomicBool,
    }

    impl Bundler for FakeBundler {
        fn bundle(&self, request: &BundleRequest) -> Result<(), BundleError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(BundleError::Failed("module not found".into()));
            }
            fs::write(&request.output, "bundled").map_err(|e| BundleError::Failed(e.to_string()))
        }
    }

    struct Fixture {
        dir: TempDir,
        npm: Arc<FakeNpm>,
        bundler: Arc<FakeBundler>,
        notifier: Arc<RecordingNotifier>,
        installer: DependencyInstaller,
    }

    impl Fixture {
        fn bundles(&self) -> usize {
            self.bundler.runs.load(Ordering::SeqCst)
        }

        fn manifest_path(&self) -> std::path::PathBuf {
            self.dir.path().join("deps.json")
        }

        /// Consume the first-scan bundle suppression.
        async fn warm_up(&self) {
            self.installer.scan("warmup.js", "").await;
        }
    }

    fn fixture_with(npm: FakeNpm, seed: &[&str]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.seed(seed.iter().map(|s| s.to_string()));

        let npm = Arc::new(npm);
        let bundler = Arc::new(FakeBundler::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let installer = DependencyInstaller::new(
            manifest,
            npm.clone(),
            bundler.clone(),
            notifier.clone(),
            InstallerOptions::default(),
        );
        Fixture {
            dir,
            npm,
            bundler,
            notifier,
            installer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeNpm::default(), &[])
    }

    #[tokio::test]
    async fn test_known_packages_install_nothing() {
        let f = fixture_with(FakeNpm::default(), &["left-pad"]);
        f.warm_up().await;

        let report = f
            .installer
            .scan("main.js", "import pad from 'left-pad'")
            .await;

        assert_eq!(report.external, vec!["left-pad"]);
        assert!(report.installed.is_empty());
        assert_eq!(report.bundled, BundleOutcome::Skipped);
        assert!(f.npm.calls().is_empty());
        assert_eq!(f.bundles(), 0);
        assert!(f.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_new_package_installs_and_bundles() {
        let f = fixture();
        f.warm_up().await;

        let report = f
            .installer
            .scan("main.js", "import pad from 'left-pad'")
            .await;

        assert_eq!(report.installed, vec!["left-pad"]);
        assert_eq!(report.bundled, BundleOutcome::Bundled { packages: 1 });
        assert_eq!(
            f.notifier.kinds(),
            vec!["package:install", "package:installed", "packages:reload"]
        );
        assert_eq!(f.bundles(), 1);

        let manifest = fs::read_to_string(f.manifest_path()).unwrap();
        assert!(manifest.contains("left-pad"));
        assert!(f.dir.path().join("deps.js").exists());
        assert_eq!(fs::read_to_string(f.dir.path().join("packages.js")).unwrap(), "bundled");
    }

    #[tokio::test]
    async fn test_installs_run_sequentially_with_one_bundle() {
        let f = fixture();
        f.warm_up().await;

        let source = "import a from 'alpha';\nimport b from 'beta';\nconst c = require('gamma');";
        let report = f.installer.scan("main.js", source).await;

        assert_eq!(f.npm.calls(), vec!["alpha", "beta", "gamma"]);
        assert!(!f.npm.overlapped.load(Ordering::SeqCst));
        assert_eq!(report.bundled, BundleOutcome::Bundled { packages: 3 });
        assert_eq!(f.bundles(), 1);
    }

    #[tokio::test]
    async fn test_failed_install_does_not_stop_queue() {
        let f = fixture_with(FakeNpm::failing(&["broken"]), &[]);
        f.warm_up().await;

        let report = f
            .installer
            .scan("main.js", "import x from 'broken'; import y from 'fine'")
            .await;

        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(report.installed, vec!["fine"]);
        assert_eq!(f.notifier.count("package:error"), 1);
        assert_eq!(report.bundled, BundleOutcome::Bundled { packages: 1 });
        assert!(!f.installer.installed().contains("broken"));
        assert!(f.installer.installed().contains("fine"));
    }

    #[tokio::test]
    async fn test_all_installs_failing_skips_bundle() {
        let f = fixture_with(FakeNpm::failing(&["broken"]), &[]);
        f.warm_up().await;

        let report = f.installer.scan("main.js", "import x from 'broken'").await;

        assert_eq!(report.bundled, BundleOutcome::Skipped);
        assert_eq!(f.bundles(), 0);
        assert!(!f.installer.is_installing());
    }

    #[tokio::test]
    async fn test_excluded_packages_are_ignored() {
        let f = fixture();
        f.warm_up().await;

        let report = f
            .installer
            .scan("main.js", "import React from 'react'; import 'flint-js'")
            .await;

        assert_eq!(report.external, vec!["react", "flint-js"]);
        assert!(f.npm.calls().is_empty());
        assert_eq!(f.bundles(), 0);
    }

    #[tokio::test]
    async fn test_scan_during_install_is_deferred() {
        let (npm, go) = FakeNpm::blocking();
        let f = fixture_with(npm, &[]);
        f.warm_up().await;

        let first = tokio::spawn({
            let installer = f.installer.clone();
            async move { installer.scan("f1.js", "import pad from 'left-pad'").await }
        });
        while f.npm.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let second = tokio::spawn({
            let installer = f.installer.clone();
            async move { installer.scan("f2.js", "import pad from 'left-pad'").await }
        });
        while f.installer.pending_scans() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        go.send(()).unwrap();
        let first = first.await.unwrap();
        let second = second.await.unwrap();

        assert_eq!(f.npm.calls(), vec!["left-pad"]);
        assert_eq!(first.installed, vec!["left-pad"]);
        assert!(second.deferred);
        assert!(second.installed.is_empty());
        assert_eq!(second.bundled, BundleOutcome::Bundled { packages: 1 });
        assert_eq!(f.bundles(), 1);
        assert!(!f.installer.is_installing());
    }

    #[tokio::test]
    async fn test_deferred_scan_installs_its_own_packages() {
        let (npm, go) = FakeNpm::blocking();
        let f = fixture_with(npm, &[]);
        f.warm_up().await;

        let first = tokio::spawn({
            let installer = f.installer.clone();
            async move { installer.scan("f1.js", "import a from 'alpha'").await }
        });
        while f.npm.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let second = tokio::spawn({
            let installer = f.installer.clone();
            async move { installer.scan("f2.js", "import b from 'beta'").await }
        });
        while f.installer.pending_scans() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        go.send(()).unwrap();
        go.send(()).unwrap();
        first.await.unwrap();
        let second = second.await.unwrap();

        assert_eq!(f.npm.calls(), vec!["alpha", "beta"]);
        assert_eq!(second.installed, vec!["beta"]);
        assert!(!f.npm.overlapped.load(Ordering::SeqCst));
        assert_eq!(f.bundles(), 1);
    }

    #[tokio::test]
    async fn test_bundler_failure_rolls_back_manifest() {
        let f = fixture();
        f.warm_up().await;
        f.installer.scan("a.js", "import m from 'moment'").await;
        let before = fs::read(f.manifest_path()).unwrap();
        fs::write(f.dir.path().join("packages.js"), "previous").unwrap();

        f.bundler.fail.store(true, Ordering::SeqCst);
        let report = f
            .installer
            .scan("b.js", "import pad from 'left-pad'")
            .await;

        assert!(matches!(report.bundled, BundleOutcome::Failed(_)));
        assert_eq!(fs::read(f.manifest_path()).unwrap(), before);
        assert_eq!(
            fs::read_to_string(f.dir.path().join("packages.js")).unwrap(),
            "previous"
        );
        assert!(!f.dir.path().join("packages.next.js").exists());
        let loader = fs::read_to_string(f.dir.path().join("deps.js")).unwrap();
        assert!(loader.contains(r#"require("moment")"#));
        assert!(!loader.contains("left-pad"));
        assert!(!f.installer.installed().contains("left-pad"));
        assert!(f.installer.installed().contains("moment"));
        assert_eq!(f.notifier.count("npm:error"), 1);
        assert!(!f.installer.is_installing());
    }

    #[tokio::test]
    async fn test_rolled_back_package_is_retried() {
        let f = fixture();
        f.warm_up().await;
        f.bundler.fail.store(true, Ordering::SeqCst);
        f.installer.scan("a.js", "import pad from 'left-pad'").await;

        f.bundler.fail.store(false, Ordering::SeqCst);
        let report = f.installer.scan("a.js", "import pad from 'left-pad'").await;

        assert_eq!(f.npm.calls(), vec!["left-pad", "left-pad"]);
        assert_eq!(report.bundled, BundleOutcome::Bundled { packages: 1 });
    }

    #[tokio::test]
    async fn test_rollback_without_snapshot_forgets_packages() {
        let f = fixture();
        f.warm_up().await;
        // an unreadable manifest makes the snapshot fail; npm clears it
        fs::create_dir(f.manifest_path()).unwrap();
        *f.npm.removes_dir.lock() = Some(f.manifest_path());
        f.bundler.fail.store(true, Ordering::SeqCst);

        let report = f.installer.scan("a.js", "import pad from 'left-pad'").await;
        assert!(matches!(report.bundled, BundleOutcome::Failed(_)));
        assert!(!f.installer.installed().contains("left-pad"));
        let loader = fs::read_to_string(f.dir.path().join("deps.js")).unwrap();
        assert!(!loader.contains("left-pad"));
        assert!(!fs::read_to_string(f.manifest_path()).unwrap().contains("left-pad"));

        f.bundler.fail.store(false, Ordering::SeqCst);
        let report = f.installer.scan("a.js", "import pad from 'left-pad'").await;
        assert_eq!(f.npm.calls(), vec!["left-pad", "left-pad"]);
        assert_eq!(report.bundled, BundleOutcome::Bundled { packages: 1 });
    }

    #[tokio::test]
    async fn test_first_scan_suppresses_bundle() {
        let f = fixture();

        let report = f
            .installer
            .scan("main.js", "import pad from 'left-pad'")
            .await;

        assert_eq!(report.installed, vec!["left-pad"]);
        assert_eq!(report.bundled, BundleOutcome::Suppressed);
        assert_eq!(f.bundles(), 0);

        let outcome = f.installer.complete_initial_build().await;
        assert_eq!(outcome, BundleOutcome::Bundled { packages: 1 });
        assert_eq!(f.bundles(), 1);
        assert_eq!(f.installer.complete_initial_build().await, BundleOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_rebundle_forces_bundle() {
        let f = fixture_with(FakeNpm::default(), &["left-pad"]);
        assert_eq!(
            f.installer.rebundle().await,
            BundleOutcome::Bundled { packages: 1 }
        );
        assert!(f.npm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_internal_imports_and_forget() {
        let f = fixture();
        f.installer
            .scan("views/main.js", "import Header from './header'\nimport u from '../lib/util.js'")
            .await;

        assert!(f.installer.is_internal("views/header.js"));
        assert!(f.installer.is_internal("lib/util.js"));
        assert!(!f.installer.is_internal("views/main.js"));

        f.installer.forget("views/main.js");
        assert!(!f.installer.is_internal("views/header.js"));
    }

    #[tokio::test]
    async fn test_forget_keeps_manifest_packages() {
        let f = fixture();
        f.warm_up().await;
        f.installer.scan("main.js", "import pad from 'left-pad'").await;

        f.installer.forget("main.js");
        assert!(f.installer.installed().contains("left-pad"));
    }

    #[test]
    fn test_module_id() {
        assert_eq!(module_id("views/main.js"), "views/main");
        assert_eq!(module_id("views/main"), "views/main");
        assert_eq!(module_id("a.b/c"), "a.b/c");
        assert_eq!(module_id(".hidden"), ".hidden");
    }
}
