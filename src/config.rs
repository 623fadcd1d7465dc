//! Configuración: secciones anidadas por componente del detector, todas con valores por defecto.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{CameraBackend, CameraProbe};

// ── Secciones ──────────────────────────────────────────────────────────────

/// Rutas de los artefactos compartidos con la API y el reentrenamiento
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_gesture_map")]
    pub gesture_map: PathBuf,
    #[serde(default = "default_model")]
    pub model: PathBuf,
    #[serde(default = "default_classes")]
    pub classes: PathBuf,
    #[serde(default = "default_command")]
    pub command: PathBuf,
    #[serde(default = "default_status")]
    pub status: PathBuf,
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,
    /// Entrena desde `dataset_dir` y escribe `classes` + `model`
    #[serde(default = "default_retrain_script")]
    pub retrain_script: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            gesture_map: default_gesture_map(),
            model: default_model(),
            classes: default_classes(),
            command: default_command(),
            status: default_status(),
            dataset_dir: default_dataset_dir(),
            retrain_script: default_retrain_script(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Cada cuánto se revisan comandos, recargas y estado con cámara apagada
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pausa por iteración cuando la cámara está apagada
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
    /// Pausa tras un fallo de lectura de frame
    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,
    #[serde(default = "default_status_throttle_ms")]
    pub status_throttle_ms: u64,
    #[serde(default = "default_action_log_capacity")]
    pub action_log_capacity: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
            read_retry_ms: default_read_retry_ms(),
            status_throttle_ms: default_status_throttle_ms(),
            action_log_capacity: default_action_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_target_samples")]
    pub target_samples: usize,
    /// Espera tras encender la cámara implícitamente para grabar
    #[serde(default = "default_camera_warmup_ms")]
    pub camera_warmup_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            target_samples: default_target_samples(),
            camera_warmup_ms: default_camera_warmup_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeConfig {
    #[serde(default = "default_swipe_history")]
    pub history: usize,
    #[serde(default = "default_swipe_threshold")]
    pub threshold: f32,
    #[serde(default = "default_swipe_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Si es true, el swipe solo despacha acciones en modo control.
    /// Por defecto es global: se ejecuta también en modo pasivo y aunque no haya
    /// modelo cargado (el swipe no depende del clasificador).
    #[serde(default)]
    pub requires_control: bool,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            history: default_swipe_history(),
            threshold: default_swipe_threshold(),
            cooldown_ms: default_swipe_cooldown_ms(),
            requires_control: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_display_threshold")]
    pub display_threshold: f32,
    #[serde(default = "default_action_threshold")]
    pub action_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            display_threshold: default_display_threshold(),
            action_threshold: default_action_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Orden de prueba al abrir la cámara
    #[serde(default = "default_probes")]
    pub probes: Vec<CameraProbe>,
    #[serde(default = "default_show_preview")]
    pub show_preview: bool,
    #[serde(default = "default_python")]
    pub python: PathBuf,
    #[serde(default = "default_sidecar_script")]
    pub sidecar_script: PathBuf,
    /// Confianza mínima del detector de manos
    #[serde(default = "default_min_hand_score")]
    pub min_hand_score: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            probes: default_probes(),
            show_preview: default_show_preview(),
            python: default_python(),
            sidecar_script: default_sidecar_script(),
            min_hand_score: default_min_hand_score(),
        }
    }
}

// ── Config principal ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default, rename = "loop")]
    pub detector: LoopConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub swipe: SwipeConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.detector.poll_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.recording.sample_interval_ms)
    }

    pub fn swipe_cooldown(&self) -> Duration {
        Duration::from_millis(self.swipe.cooldown_ms)
    }

    pub fn status_throttle(&self) -> Duration {
        Duration::from_millis(self.detector.status_throttle_ms)
    }
}

// ── Valores por defecto ────────────────────────────────────────────────────

fn default_gesture_map() -> PathBuf { "gesture_map.json".into() }
fn default_model() -> PathBuf { "model.onnx".into() }
fn default_classes() -> PathBuf { "classes.json".into() }
fn default_command() -> PathBuf { "recording_cmd.json".into() }
fn default_status() -> PathBuf { "status.json".into() }
fn default_dataset_dir() -> PathBuf { "dataset".into() }
fn default_retrain_script() -> PathBuf { "scripts/retrain.py".into() }
fn default_poll_interval_ms() -> u64 { 500 }
fn default_idle_sleep_ms() -> u64 { 100 }
fn default_read_retry_ms() -> u64 { 100 }
fn default_status_throttle_ms() -> u64 { 200 }
fn default_action_log_capacity() -> usize { 5 }
fn default_sample_interval_ms() -> u64 { 250 }
fn default_target_samples() -> usize { 60 }
fn default_camera_warmup_ms() -> u64 { 1000 }
fn default_swipe_history() -> usize { 10 }
fn default_swipe_threshold() -> f32 { 0.3 }
fn default_swipe_cooldown_ms() -> u64 { 1000 }
fn default_display_threshold() -> f32 { 0.6 }
fn default_action_threshold() -> f32 { 0.7 }
fn default_show_preview() -> bool { true }
fn default_python() -> PathBuf { ".venv/bin/python".into() }
fn default_sidecar_script() -> PathBuf { "scripts/hand_sidecar.py".into() }
fn default_min_hand_score() -> f32 { 0.5 }

fn default_probes() -> Vec<CameraProbe> {
    vec![
        CameraProbe { index: 0, backend: CameraBackend::Preferred },
        CameraProbe { index: 0, backend: CameraBackend::Default },
        CameraProbe { index: 1, backend: CameraBackend::Default },
    ]
}

// ── Carga ──────────────────────────────────────────────────────────────────

pub const DEFAULT_CONFIG_FILE: &str = "gestured.json";

/// Carga la configuración. Un archivo ausente o inválido no es fatal: se usan los
/// valores por defecto.
pub fn load_config(path: &Path) -> Config {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            log::info!("No hay {:?}, usando valores por defecto", path);
            return Config::default();
        }
    };

    match serde_json::from_str::<Config>(&contents) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("Config inválida en {:?}: {e}. Usando valores por defecto.", path);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.detector.poll_interval_ms, 500);
        assert_eq!(cfg.recording.target_samples, 60);
        assert_eq!(cfg.recording.sample_interval_ms, 250);
        assert_eq!(cfg.swipe.history, 10);
        assert!(!cfg.swipe.requires_control);
        assert_eq!(cfg.classifier.action_threshold, 0.7);
        assert_eq!(cfg.camera.probes.len(), 3);
        assert_eq!(cfg.paths.command, PathBuf::from("recording_cmd.json"));
        assert_eq!(cfg.paths.retrain_script, PathBuf::from("scripts/retrain.py"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let json = r#"{
            "swipe": { "requires_control": true },
            "loop": { "poll_interval_ms": 100 }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert!(cfg.swipe.requires_control);
        assert_eq!(cfg.swipe.threshold, 0.3);
        assert_eq!(cfg.detector.poll_interval_ms, 100);
        assert_eq!(cfg.detector.idle_sleep_ms, 100);
    }

    #[test]
    fn test_missing_and_malformed_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert_eq!(load_config(&missing).recording.target_samples, 60);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(load_config(&bad).swipe.cooldown_ms, 1000);
    }
}
