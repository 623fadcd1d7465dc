//! Captura de cámara: trait `Camera`, sondeo con fallback y vista de depuración.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::HandLandmarks;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("No se pudo abrir ninguna cámara")]
    NoCamera,

    #[error("Cámara {index} ({backend:?}) no disponible: {reason}")]
    OpenFailed {
        index: u32,
        backend: CameraBackend,
        reason: String,
    },

    #[error("Cámara no abierta")]
    NotOpen,

    #[error("Fallo al leer frame: {0}")]
    ReadFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Backend de captura. `Preferred` es el backend nativo de la plataforma
/// (DirectShow en Windows, V4L2 en Linux).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    Preferred,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraProbe {
    pub index: u32,
    pub backend: CameraBackend,
}

/// Resultado de procesar un frame: la mano detectada (si hay una)
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub hand: Option<HandLandmarks>,
}

/// Contenido de la ventana de depuración para un frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugView {
    /// Líneas de texto superpuestas, en orden
    pub lines: Vec<String>,
    /// Progreso de grabación (0.0 a 1.0)
    pub progress: Option<f32>,
    pub draw_landmarks: bool,
}

impl DebugView {
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    Continue,
    /// Se pulsó la tecla de salida (Esc) en la ventana
    Abort,
}

/// Fuente de frames con detección de manos integrada
pub trait Camera {
    fn open(&mut self, probe: CameraProbe) -> Result<(), CameraError>;
    fn is_open(&self) -> bool;
    /// Lee un frame. Un error es transitorio: el llamador reintenta.
    fn read(&mut self) -> Result<Frame, CameraError>;
    /// Muestra la vista de depuración del último frame leído
    fn show(&mut self, view: &DebugView) -> Result<ViewEvent, CameraError>;
    /// Libera el dispositivo y cierra la ventana de depuración
    fn release(&mut self);
}

/// Prueba cada sonda en orden hasta que una abra la cámara
pub fn open_with_fallback(
    camera: &mut dyn Camera,
    probes: &[CameraProbe],
) -> Result<CameraProbe, CameraError> {
    for probe in probes {
        log::info!("Abriendo cámara {} ({:?})...", probe.index, probe.backend);
        match camera.open(*probe) {
            Ok(()) if camera.is_open() => {
                log::info!("Cámara {} ({:?}) abierta", probe.index, probe.backend);
                return Ok(*probe);
            }
            Ok(()) => log::warn!("Cámara {} ({:?}) no quedó abierta", probe.index, probe.backend),
            Err(e) => log::warn!("{e}"),
        }
    }
    log::error!("No se pudo abrir ninguna cámara");
    Err(CameraError::NoCamera)
}
