//! Model lifecycle management.
//!
//! A [`ModelRegistry`] owns zero or one loaded instance of a model group and
//! moves it through `Unloaded -> Loading -> Loaded -> Unloading -> Unloaded`.
//! The transient states are exclusive: a caller arriving while another thread
//! loads or unloads waits for that transition to finish instead of starting
//! its own. Requests hold an `Arc` to the loaded models, so an unload never
//! pulls sessions out from under an in-flight inference.

use crate::core::errors::{OCRError, OcrResult};
use crate::core::config::ModelManifest;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{info, warn};

/// Builds one model group.
pub trait ModelLoader: Send + Sync {
    /// The loaded sessions of the group.
    type Models: Send + Sync;

    /// Group name used in logs and errors, e.g. `ocr` or `structure`.
    fn group(&self) -> &str;

    /// Files that must exist before loading starts.
    fn required_files(&self) -> Vec<PathBuf>;

    /// Loads every model of the group.
    fn load(&self) -> OcrResult<Self::Models>;

    /// Identity metadata reported by status queries.
    fn model_info(&self) -> ModelInfo;
}

/// Identity of a model group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Group name.
    pub group: String,
    /// Models directory the files were resolved against.
    pub models_dir: PathBuf,
    /// `(role, file)` pairs.
    pub models: Vec<ModelEntry>,
}

/// One model file of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEntry {
    pub role: String,
    pub path: PathBuf,
}

/// Lifecycle state of a model group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// Snapshot returned by [`ModelRegistry::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub state: ModelState,
    pub loaded: bool,
    pub model_info: ModelInfo,
}

enum Slot<M> {
    Unloaded,
    Loading,
    Loaded(Arc<M>),
    Unloading,
}

impl<M> Slot<M> {
    fn state(&self) -> ModelState {
        match self {
            Slot::Unloaded => ModelState::Unloaded,
            Slot::Loading => ModelState::Loading,
            Slot::Loaded(_) => ModelState::Loaded,
            Slot::Unloading => ModelState::Unloading,
        }
    }
}

/// Owns the loaded instance of one model group.
pub struct ModelRegistry<L: ModelLoader> {
    loader: L,
    auto_load: bool,
    slot: Mutex<Slot<L::Models>>,
    changed: Condvar,
}

impl<L: ModelLoader> std::fmt::Debug for ModelRegistry<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("group", &self.loader.group())
            .field("auto_load", &self.auto_load)
            .field("state", &self.state())
            .finish()
    }
}

impl<L: ModelLoader> ModelRegistry<L> {
    /// Creates an unloaded registry.
    ///
    /// With `auto_load`, [`acquire`](Self::acquire) loads on first use;
    /// without it, acquiring an unloaded group fails with `ModelNotLoaded`.
    pub fn new(loader: L, auto_load: bool) -> Self {
        Self {
            loader,
            auto_load,
            slot: Mutex::new(Slot::Unloaded),
            changed: Condvar::new(),
        }
    }

    /// The loader backing this registry.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Whether analysis requests load the group on demand.
    pub fn auto_load(&self) -> bool {
        self.auto_load
    }

    fn lock(&self) -> MutexGuard<'_, Slot<L::Models>> {
        // The slot is only ever replaced whole, so a poisoned guard still holds
        // a consistent value.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the slot once no transition is running.
    fn settled(&self) -> MutexGuard<'_, Slot<L::Models>> {
        self.changed
            .wait_while(self.lock(), |slot| {
                matches!(slot, Slot::Loading | Slot::Unloading)
            })
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, state: Slot<L::Models>) {
        *self.lock() = state;
        self.changed.notify_all();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModelState {
        self.lock().state()
    }

    /// Loads the group, or returns the already-loaded instance.
    ///
    /// Idempotent. A call that arrives while another load is running waits for
    /// it and shares its result; if that load fails, this call retries.
    pub fn load(&self) -> OcrResult<Arc<L::Models>> {
        {
            let mut guard = self.settled();
            if let Slot::Loaded(models) = &*guard {
                return Ok(Arc::clone(models));
            }
            *guard = Slot::Loading;
        }
        let transition = Transition::new(self);

        let group = self.loader.group().to_string();
        let required = self.loader.required_files();
        let refs: Vec<&std::path::Path> = required.iter().map(PathBuf::as_path).collect();
        let missing = ModelManifest::missing(&refs);
        if !missing.is_empty() {
            warn!(group = %group, missing = missing.len(), "model files incomplete");
            return Err(OCRError::ModelFilesIncomplete { missing });
        }

        info!(group = %group, "loading models");
        let started = Instant::now();
        match self.loader.load() {
            Ok(models) => {
                let models = Arc::new(models);
                transition.finish(Slot::Loaded(Arc::clone(&models)));
                info!(
                    group = %group,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "models loaded"
                );
                Ok(models)
            }
            Err(err) => {
                warn!(group = %group, error = %err, "model load failed");
                Err(err)
            }
        }
    }

    /// Releases the loaded sessions. Returns false when nothing was loaded.
    pub fn unload(&self) -> bool {
        let models = {
            let mut guard = self.settled();
            if !matches!(*guard, Slot::Loaded(_)) {
                return false;
            }
            match std::mem::replace(&mut *guard, Slot::Unloading) {
                Slot::Loaded(models) => models,
                other => {
                    *guard = other;
                    return false;
                }
            }
        };

        let transition = Transition::new(self);
        let in_flight = Arc::strong_count(&models) - 1;
        drop(models);
        transition.finish(Slot::Unloaded);
        info!(group = %self.loader.group(), in_flight, "models unloaded");
        true
    }

    /// Returns the loaded models for one analysis request.
    ///
    /// Loads on demand when auto-load is on. Otherwise waits out a running
    /// transition and fails with `ModelNotLoaded` if the group is not loaded.
    pub fn acquire(&self) -> OcrResult<Arc<L::Models>> {
        if self.auto_load {
            return self.load();
        }
        match &*self.settled() {
            Slot::Loaded(models) => Ok(Arc::clone(models)),
            _ => Err(OCRError::ModelNotLoaded {
                group: self.loader.group().to_string(),
            }),
        }
    }

    /// Current state plus model identity.
    pub fn status(&self) -> ModelStatus {
        let state = self.state();
        ModelStatus {
            state,
            loaded: state == ModelState::Loaded,
            model_info: self.loader.model_info(),
        }
    }
}

/// An in-progress `Loading` or `Unloading` transition.
///
/// Dropped without [`finish`](Self::finish), on an early return or while a
/// loader panic unwinds, it puts the slot back to `Unloaded` and wakes the
/// waiters so they never block on a transition that will not complete.
struct Transition<'a, L: ModelLoader> {
    registry: &'a ModelRegistry<L>,
    finished: bool,
}

impl<'a, L: ModelLoader> Transition<'a, L> {
    fn new(registry: &'a ModelRegistry<L>) -> Self {
        Self {
            registry,
            finished: false,
        }
    }

    fn finish(mut self, slot: Slot<L::Models>) {
        self.finished = true;
        self.registry.set(slot);
    }
}

impl<L: ModelLoader> Drop for Transition<'_, L> {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.set(Slot::Unloaded);
        }
    }
}
