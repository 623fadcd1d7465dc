//! Instantánea de estado para la API/UI (`status.json`).
//!
//! La escritura es telemetría de mejor esfuerzo: los fallos se registran y se ignoran.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub name: String,
    /// Hora legible, `HH:MM:SS`
    pub time: String,
    /// Segundos Unix
    pub timestamp: f64,
}

impl ActionLogEntry {
    pub fn now(name: impl Into<String>) -> Self {
        let now = chrono::Local::now();
        Self {
            name: name.into(),
            time: now.format("%H:%M:%S").to_string(),
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
        }
    }
}

/// Registro acotado de acciones ejecutadas; descarta la más antigua al llenarse
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    capacity: usize,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ActionLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> Vec<ActionLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub recording: bool,
    pub current_gesture: Option<String>,
    pub confidence: f32,
    pub model_loaded: bool,
    pub camera_on: bool,
    pub control_active: bool,
    pub last_update: String,
    pub action_log: Vec<ActionLogEntry>,
}

impl StatusSnapshot {
    /// Lee el estado publicado (lado consumidor)
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

pub fn timestamp_string() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub struct StatusPublisher {
    path: PathBuf,
    throttle: Duration,
    last_publish: Option<Instant>,
}

impl StatusPublisher {
    pub fn new(path: impl Into<PathBuf>, throttle: Duration) -> Self {
        Self {
            path: path.into(),
            throttle,
            last_publish: None,
        }
    }

    /// Publica sin límite de frecuencia
    pub fn publish(&mut self, snapshot: &StatusSnapshot, now: Instant) {
        if let Err(e) = self.write(snapshot) {
            log::debug!("No se pudo escribir {:?}: {e}", self.path);
        }
        self.last_publish = Some(now);
    }

    /// Publica solo si pasó el intervalo mínimo desde la última escritura
    pub fn publish_throttled(&mut self, snapshot: &StatusSnapshot, now: Instant) -> bool {
        if let Some(last) = self.last_publish {
            if now.saturating_duration_since(last) <= self.throttle {
                return false;
            }
        }
        self.publish(snapshot, now);
        true
    }

    fn write(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
