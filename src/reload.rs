//! Recarga en caliente de artefactos por fecha de modificación.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Vigila la fecha de modificación de un archivo
#[derive(Debug)]
pub struct ArtifactWatcher {
    path: PathBuf,
    last_seen: Option<SystemTime>,
}

impl ArtifactWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_seen: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Devuelve la nueva fecha si el archivo existe y es más reciente que la última vista.
    /// La fecha queda registrada aunque la carga posterior falle: no se reintenta
    /// hasta la siguiente modificación.
    pub fn poll_change(&mut self) -> Option<SystemTime> {
        let mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        let newer = match self.last_seen {
            Some(last) => mtime > last,
            None => true,
        };
        if newer {
            self.last_seen = Some(mtime);
            Some(mtime)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Reloaded,
    /// El archivo cambió pero no se pudo cargar; sigue vigente el valor anterior
    Failed,
}

type Loader<T> = Box<dyn FnMut(&Path) -> anyhow::Result<T>>;

/// Valor recargable: solo se reemplaza tras una carga completa y correcta
pub struct Reloadable<T> {
    name: &'static str,
    value: T,
    watcher: ArtifactWatcher,
    loader: Loader<T>,
}

impl<T> Reloadable<T> {
    pub fn new(
        name: &'static str,
        path: impl Into<PathBuf>,
        initial: T,
        loader: impl FnMut(&Path) -> anyhow::Result<T> + 'static,
    ) -> Self {
        Self {
            name,
            value: initial,
            watcher: ArtifactWatcher::new(path),
            loader: Box::new(loader),
        }
    }

    pub fn refresh(&mut self) -> ReloadOutcome {
        if self.watcher.poll_change().is_none() {
            return ReloadOutcome::Unchanged;
        }
        match (self.loader)(self.watcher.path()) {
            Ok(value) => {
                self.value = value;
                log::info!("{} recargado desde {:?}", self.name, self.watcher.path());
                ReloadOutcome::Reloaded
            }
            Err(e) => {
                log::warn!(
                    "No se pudo recargar {} ({:?}): {e:#}. Se mantiene el anterior.",
                    self.name,
                    self.watcher.path()
                );
                ReloadOutcome::Failed
            }
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
