//! Buzón de comandos externos (cámara, modo, grabación).
//!
//! El canal de archivo es de un solo hueco: el escritor (API o `gesturectl`)
//! sobrescribe el archivo y el detector lo lee y lo borra. Si llegan dos
//! escrituras entre sondeos solo se observa la última. Una escritura que cae
//! entre la lectura y el borrado se pierde; esa carrera se acepta.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Instrucción de un solo uso
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    StartCamera,
    StopCamera,
    SetMode {
        #[serde(default)]
        mode: String,
    },
    #[serde(rename = "start")]
    StartRecording { name: String },
}

/// Origen de comandos sondeado por el detector
pub trait CommandSource {
    /// Devuelve el comando pendiente, consumiéndolo
    fn poll(&mut self) -> Option<Command>;
}

/// Canal basado en archivo compartido entre procesos
pub struct FileCommandChannel {
    path: PathBuf,
}

impl FileCommandChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lado escritor: sobrescribe el comando pendiente
    pub fn send(&self, command: &Command) -> Result<(), CommandError> {
        let json = serde_json::to_string(command)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn take_raw(&self) -> Result<Option<String>, CommandError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Se borra también si el contenido es inválido, para no reprocesarlo
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Some(contents))
    }
}

impl CommandSource for FileCommandChannel {
    fn poll(&mut self) -> Option<Command> {
        let raw = match self.take_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Error leyendo comando {:?}: {e}", self.path);
                return None;
            }
        };
        match serde_json::from_str::<Command>(&raw) {
            Ok(cmd) => {
                log::info!("Comando recibido: {:?}", cmd);
                Some(cmd)
            }
            Err(e) => {
                log::warn!("Comando inválido descartado ({e}): {}", raw.trim());
                None
            }
        }
    }
}

/// Canal en proceso de un solo hueco: el último `send` antes de un `poll` gana
#[derive(Clone, Default)]
pub struct SlotCommandChannel {
    slot: Arc<Mutex<Option<Command>>>,
}

impl SlotCommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, command: Command) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(command);
        }
    }
}

impl CommandSource for SlotCommandChannel {
    fn poll(&mut self) -> Option<Command> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_matches_api() {
        let cmd: Command = serde_json::from_str(r#"{"action":"start","name":"wave"}"#).unwrap();
        assert_eq!(cmd, Command::StartRecording { name: "wave".into() });

        let cmd: Command = serde_json::from_str(r#"{"action":"set_mode","mode":"control"}"#).unwrap();
        assert_eq!(cmd, Command::SetMode { mode: "control".into() });

        let cmd: Command = serde_json::from_str(r#"{"action":"stop_camera"}"#).unwrap();
        assert_eq!(cmd, Command::StopCamera);

        assert_eq!(
            serde_json::to_string(&Command::StartCamera).unwrap(),
            r#"{"action":"start_camera"}"#
        );
    }

    #[test]
    fn test_poll_consumes_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut channel = FileCommandChannel::new(dir.path().join("cmd.json"));
        assert!(channel.poll().is_none());

        channel.send(&Command::StartCamera).unwrap();
        assert_eq!(channel.poll(), Some(Command::StartCamera));
        assert!(channel.poll().is_none());
        assert!(!channel.path().exists());
    }

    #[test]
    fn test_last_write_before_poll_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut channel = FileCommandChannel::new(dir.path().join("cmd.json"));
        channel.send(&Command::StartCamera).unwrap();
        channel.send(&Command::SetMode { mode: "control".into() }).unwrap();

        assert_eq!(channel.poll(), Some(Command::SetMode { mode: "control".into() }));
        assert!(channel.poll().is_none());
    }

    #[test]
    fn test_malformed_command_is_absence_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmd.json");
        let mut channel = FileCommandChannel::new(&path);

        fs::write(&path, "{ broken").unwrap();
        assert!(channel.poll().is_none());
        assert!(!path.exists());

        fs::write(&path, r#"{"action":"dance"}"#).unwrap();
        assert!(channel.poll().is_none());
    }

    #[test]
    fn test_slot_channel_coalesces() {
        let mut channel = SlotCommandChannel::new();
        let writer = channel.clone();
        writer.send(Command::StartCamera);
        writer.send(Command::StopCamera);
        assert_eq!(channel.poll(), Some(Command::StopCamera));
        assert_eq!(channel.poll(), None);
    }
}
