//! Cámara + detector de manos en un subproceso Python (OpenCV + MediaPipe)
//!
//! El subproceso se comunica por líneas JSON en stdin/stdout. Cada petición
//! recibe exactamente una respuesta:
//!
//! ```text
//! → {"op":"open","index":0,"backend":"preferred"}   ← {"ok":true}
//! → {"op":"read"}                                    ← {"ok":true,"hands":[...]}
//! → {"op":"show","lines":[...],"progress":0.5}       ← {"ok":true,"key":27}
//! → {"op":"close"}                                   ← {"ok":true}
//! ```
//!
//! Al arrancar el subproceso imprime `READY`.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::camera::{Camera, CameraBackend, CameraError, CameraProbe, DebugView, Frame, ViewEvent};
use crate::types::{HandLandmarks, Landmark, NUM_KEYPOINTS};

const ESC_KEY: i32 = 27;

#[derive(Serialize, Debug)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Open { index: u32, backend: CameraBackend },
    Read,
    Show {
        lines: &'a [String],
        progress: Option<f32>,
        draw_landmarks: bool,
    },
    Close,
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug, Default)]
struct Response {
    ok: bool,
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    key: Option<i32>,
    #[serde(default)]
    error: Option<String>,
}

/// Cámara respaldada por el subproceso `hand_sidecar.py`
pub struct HandSidecar {
    process: Child,
    stdin: ChildStdin,
    stdout_reader: BufReader<ChildStdout>,
    open: bool,
}

impl HandSidecar {
    /// Lanza el subproceso y espera la señal `READY`
    pub fn spawn(python: &Path, script: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        if !script.exists() {
            anyhow::bail!("No se encontró el script de detección en {:?}", script);
        }

        log::info!("Iniciando subproceso de detección de manos...");

        let mut process = Command::new(python)
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("No se pudo lanzar {:?}", python))?;

        let stdin = process.stdin.take().context("Sin stdin en el subproceso")?;
        let stdout = process.stdout.take().context("Sin stdout en el subproceso")?;
        let mut stdout_reader = BufReader::new(stdout);

        let mut ready_line = String::new();
        stdout_reader.read_line(&mut ready_line)?;
        if ready_line.trim() != "READY" {
            let _ = process.kill();
            anyhow::bail!("El subproceso no envió READY, recibido: {}", ready_line.trim());
        }

        log::info!("Detector de manos listo");

        Ok(Self {
            process,
            stdin,
            stdout_reader,
            open: false,
        })
    }

    fn request(&mut self, req: &Request<'_>) -> Result<Response, CameraError> {
        let line = serde_json::to_string(req)?;
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;

        let mut response = String::new();
        let n = self.stdout_reader.read_line(&mut response)?;
        if n == 0 {
            self.open = false;
            return Err(CameraError::ReadFailed("el subproceso terminó".into()));
        }
        Ok(serde_json::from_str(&response)?)
    }
}

/// Toma la primera mano con 21 puntos
fn first_hand(hands: Vec<HandJson>) -> Option<HandLandmarks> {
    for hand in hands {
        if hand.landmarks.len() != NUM_KEYPOINTS {
            log::warn!("Se esperaban {} puntos, llegaron {}", NUM_KEYPOINTS, hand.landmarks.len());
            continue;
        }
        let mut landmarks = [Landmark::default(); NUM_KEYPOINTS];
        for (i, lm) in hand.landmarks.iter().enumerate() {
            landmarks[i] = Landmark { x: lm.x, y: lm.y, z: lm.z };
        }
        return Some(HandLandmarks {
            landmarks,
            score: hand.score,
            handedness: hand.handedness,
        });
    }
    None
}

impl Camera for HandSidecar {
    fn open(&mut self, probe: CameraProbe) -> Result<(), CameraError> {
        let resp = self.request(&Request::Open {
            index: probe.index,
            backend: probe.backend,
        })?;
        if !resp.ok {
            return Err(CameraError::OpenFailed {
                index: probe.index,
                backend: probe.backend,
                reason: resp.error.unwrap_or_else(|| "desconocido".into()),
            });
        }
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        let resp = self.request(&Request::Read)?;
        if !resp.ok {
            return Err(CameraError::ReadFailed(
                resp.error.unwrap_or_else(|| "frame vacío".into()),
            ));
        }
        Ok(Frame {
            hand: first_hand(resp.hands),
        })
    }

    fn show(&mut self, view: &DebugView) -> Result<ViewEvent, CameraError> {
        let resp = self.request(&Request::Show {
            lines: &view.lines,
            progress: view.progress,
            draw_landmarks: view.draw_landmarks,
        })?;
        if resp.key == Some(ESC_KEY) {
            return Ok(ViewEvent::Abort);
        }
        Ok(ViewEvent::Continue)
    }

    fn release(&mut self) {
        if let Err(e) = self.request(&Request::Close) {
            log::warn!("Error cerrando la cámara: {e}");
        }
        self.open = false;
    }
}

impl Drop for HandSidecar {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let open = serde_json::to_string(&Request::Open {
            index: 1,
            backend: CameraBackend::Default,
        })
        .unwrap();
        assert_eq!(open, r#"{"op":"open","index":1,"backend":"default"}"#);
        assert_eq!(serde_json::to_string(&Request::Read).unwrap(), r#"{"op":"read"}"#);
    }

    #[test]
    fn test_response_picks_first_complete_hand() {
        let pts: Vec<String> = (0..21)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0}}"#, i as f32 / 100.0))
            .collect();
        let json = format!(
            r#"{{"ok":true,"hands":[{{"score":0.9,"landmarks":[{{"x":0.1,"y":0.1}}]}},{{"handedness":"Left","score":0.8,"landmarks":[{}]}}]}}"#,
            pts.join(",")
        );
        let resp: Response = serde_json::from_str(&json).unwrap();
        let hand = first_hand(resp.hands).unwrap();
        assert_eq!(hand.handedness, "Left");
        assert_eq!(hand.landmarks[20].x, 0.2);
    }

    #[test]
    fn test_error_response_defaults() {
        let resp: Response = serde_json::from_str(r#"{"ok":false,"error":"no frame"}"#).unwrap();
        assert!(!resp.ok);
        assert!(resp.hands.is_empty());
        assert_eq!(resp.error.as_deref(), Some("no frame"));
    }
}
