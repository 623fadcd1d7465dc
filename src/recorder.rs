//! Grabación de muestras de entrenamiento con muestreo por ventana fija.
//!
//! Un vector se acepta solo si pasó al menos `interval` desde el anterior, de
//! modo que el tamaño de la muestra no depende de los FPS de la cámara. Al llegar
//! a `target` vectores la muestra se persiste y el grabador vuelve a reposo.

use std::time::{Duration, Instant};

use crate::dataset::{DatasetWriter, SavedSample};
use crate::types::LandmarkVector;

/// Sesión de grabación activa
#[derive(Debug)]
struct RecordingSession {
    gesture: String,
    started_at: Instant,
    /// Segundos Unix al iniciar, para convertir `Instant` en marcas absolutas
    started_wall: f64,
    samples: Vec<LandmarkVector>,
    timestamps: Vec<f64>,
    last_sample_at: Option<Instant>,
}

#[derive(Debug)]
pub enum RecordOutcome {
    /// No hay grabación activa
    Idle,
    /// Llegó antes del intervalo mínimo
    Skipped,
    /// Aceptado; número de vectores acumulados
    Accepted(usize),
    /// Se alcanzó el objetivo y se guardó la muestra
    Completed(SavedSample),
    /// Se alcanzó el objetivo pero falló la escritura; la grabación se descarta
    Failed,
}

pub struct Recorder {
    writer: DatasetWriter,
    interval: Duration,
    target: usize,
    session: Option<RecordingSession>,
}

impl Recorder {
    pub fn new(writer: DatasetWriter, interval: Duration, target: usize) -> Self {
        Self {
            writer,
            interval,
            target: target.max(1),
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn gesture(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.gesture.as_str())
    }

    /// Vectores acumulados en la sesión activa
    pub fn len(&self) -> usize {
        self.session.as_ref().map(|s| s.samples.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn progress(&self) -> f32 {
        self.len() as f32 / self.target as f32
    }

    /// Inicia una grabación nueva, descartando cualquier buffer anterior
    pub fn begin(&mut self, gesture: &str, now: Instant) {
        if let Some(prev) = &self.session {
            log::warn!(
                "Grabación de '{}' reemplazada ({} vectores descartados)",
                prev.gesture,
                prev.samples.len()
            );
        }
        self.session = Some(RecordingSession {
            gesture: gesture.to_string(),
            started_at: now,
            started_wall: unix_now(),
            samples: Vec::with_capacity(self.target),
            timestamps: Vec::with_capacity(self.target),
            last_sample_at: None,
        });
        log::info!("Grabando '{}' ({} vectores)", gesture, self.target);
    }

    /// Ofrece un vector al grabador
    pub fn push(&mut self, vector: &LandmarkVector, now: Instant) -> RecordOutcome {
        let Some(session) = self.session.as_mut() else {
            return RecordOutcome::Idle;
        };

        if let Some(last) = session.last_sample_at {
            if now.saturating_duration_since(last) < self.interval {
                return RecordOutcome::Skipped;
            }
        }

        session.samples.push(vector.clone());
        session.last_sample_at = Some(now);
        let offset = now.saturating_duration_since(session.started_at).as_secs_f64();
        session.timestamps.push(session.started_wall + offset);

        let count = session.samples.len();
        if count < self.target {
            return RecordOutcome::Accepted(count);
        }

        self.complete(now)
    }

    fn complete(&mut self, now: Instant) -> RecordOutcome {
        let Some(session) = self.session.take() else {
            return RecordOutcome::Idle;
        };
        let duration = now.saturating_duration_since(session.started_at).as_secs_f64();

        match self.writer.save(
            &session.gesture,
            &session.samples,
            session.timestamps,
            duration,
        ) {
            Ok(saved) => {
                log::info!(
                    "Grabación guardada para '{}' en {:?} (duración: {:.2}s)",
                    session.gesture,
                    saved.sample_path,
                    duration
                );
                RecordOutcome::Completed(saved)
            }
            Err(e) => {
                log::error!("No se pudo guardar la grabación de '{}': {e}", session.gesture);
                RecordOutcome::Failed
            }
        }
    }
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
