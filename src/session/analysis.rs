//! One analysis session: a private copy of a build output, watched for changes.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
};

use log::{debug, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tempfile::TempDir;

use crate::{
    layout::{Analyzer, Layout},
    session::{context::LoadContext, target::SessionKey},
    Error::LoadIsolation,
    Result,
};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Observable session state. A dropped session is disposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Serving requests from an up-to-date copy.
    Ready,
    /// The watched directory changed; the registry replaces the session on next use.
    Invalidated,
}

/// A load context over a private copy of one build output directory.
///
/// The original directory is watched; the first change that is not a plain access marks the
/// session invalidated. Analyses are serialized: the analyzer and the load context are only
/// ever used by one request at a time.
pub struct AnalysisSession {
    // Field order is drop order: stop watching first, remove the copy last.
    watcher: Mutex<Option<RecommendedWatcher>>,
    key: SessionKey,
    generation: u64,
    output_dir: PathBuf,
    primary_assembly: Option<String>,
    invalidated: Arc<AtomicBool>,
    analyzer: Mutex<Analyzer>,
    context: Arc<Mutex<LoadContext>>,
    workspace: TempDir,
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("output_dir", &self.output_dir)
            .field("workspace", &self.workspace.path())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AnalysisSession {
    /// Start watching the output directory of `key`, copy it and create an empty load
    /// context over the copy.
    ///
    /// # Errors
    /// [`crate::Error::LoadIsolation`] if the output directory does not exist,
    /// [`crate::Error::FileError`] if the copy fails and [`crate::Error::Watch`] if the
    /// directory cannot be watched.
    pub fn open(key: SessionKey) -> Result<AnalysisSession> {
        let (output_dir, primary_assembly) = key.target.output()?;
        if !output_dir.is_dir() {
            return Err(LoadIsolation(format!(
                "output directory {} does not exist",
                output_dir.display()
            )));
        }

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let invalidated = Arc::new(AtomicBool::new(false));
        // Watch before copying: a rebuild racing the copy must invalidate the session
        let watcher = start_watching(&output_dir, generation, Arc::clone(&invalidated))?;

        let workspace = tempfile::Builder::new()
            .prefix(&format!("layoutscope-{generation}-"))
            .tempdir()?;
        let copied = copy_regular_files(&output_dir, workspace.path())?;

        info!(
            "Opened session {generation} for {} ({copied} files, {})",
            output_dir.display(),
            key.platform
        );

        let context = LoadContext::new(workspace.path());
        Ok(AnalysisSession {
            watcher: Mutex::new(Some(watcher)),
            analyzer: Mutex::new(Analyzer::new(key.platform)),
            key,
            generation,
            output_dir,
            primary_assembly,
            invalidated,
            context: Arc::new(Mutex::new(context)),
            workspace,
        })
    }

    /// The key this session was opened for.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Process-unique sequence number of this session.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The watched build output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The private copy assemblies are loaded from.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Primary assembly name of a project target.
    #[must_use]
    pub fn primary_assembly(&self) -> Option<&str> {
        self.primary_assembly.as_deref()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_invalidated() {
            SessionState::Invalidated
        } else {
            SessionState::Ready
        }
    }

    /// `true` once the watched directory has changed.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    /// Mark the session invalidated and stop watching. Returns `false` if it already was
    /// invalidated.
    pub fn invalidate(&self) -> bool {
        let first = !self.invalidated.swap(true, Ordering::AcqRel);
        if first {
            info!("Session {} invalidated", self.generation);
        }
        self.stop_watching();
        first
    }

    /// `true` while the output directory is watched.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        lock!(self.watcher).is_ok_and(|watcher| watcher.is_some())
    }

    /// Release the watcher. Called on invalidation and on drop.
    pub fn stop_watching(&self) {
        let watcher = match lock!(self.watcher) {
            Ok(mut watcher) => watcher.take(),
            Err(error) => {
                debug!("Session {} watcher unavailable: {error}", self.generation);
                None
            }
        };

        if let Some(mut watcher) = watcher {
            if let Err(error) = watcher.unwatch(&self.output_dir) {
                debug!("Session {} unwatch failed: {error}", self.generation);
            }
            debug!("Session {} stopped watching {}", self.generation, self.output_dir.display());
        }
    }

    /// Weak handle on the load context, for observing its release.
    #[must_use]
    pub fn context_handle(&self) -> Weak<Mutex<LoadContext>> {
        Arc::downgrade(&self.context)
    }

    /// Load `assembly_name` from the copy, resolve `type_name` in it and compute its layout.
    ///
    /// # Errors
    /// [`crate::Error::Format`] for malformed type names, [`crate::Error::NotFound`] if the
    /// type does not exist, [`crate::Error::LoadIsolation`] if the assembly or a dependency
    /// the layout needs cannot be loaded, and [`crate::Error::LockError`] if a previous
    /// analysis panicked.
    pub fn load_and_analyze(&self, assembly_name: &str, type_name: &str) -> Result<Option<Layout>> {
        let mut analyzer = lock!(self.analyzer)?;
        let mut context = lock!(self.context)?;

        let descriptor = context.resolve_type(assembly_name, type_name)?;
        debug!(
            "Session {}: analyzing {descriptor} from {assembly_name}",
            self.generation
        );
        analyzer.analyze(context.registry(), &descriptor)
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        self.stop_watching();
        info!("Disposed session {}", self.generation);
    }
}

fn start_watching(
    output_dir: &Path,
    generation: u64,
    invalidated: Arc<AtomicBool>,
) -> Result<RecommendedWatcher> {
    let watched = output_dir.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        match event {
            Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
            Ok(event) => {
                if !invalidated.swap(true, Ordering::AcqRel) {
                    info!(
                        "Session {generation} invalidated: {:?} in {}",
                        event.kind,
                        watched.display()
                    );
                }
            }
            Err(error) => warn!("Session {generation} watcher error: {error}"),
        }
    })?;
    watcher.watch(output_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn copy_regular_files(source: &Path, destination: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), destination.join(entry.file_name()))?;
            copied += 1;
        }
    }
    Ok(copied)
}
