//! Acciones del sistema y su ejecución mediante un dispositivo HID virtual (/dev/uinput).

use crossbeam_channel::{unbounded, Sender};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uinput::device::Device;
use uinput::event::keyboard;
use uinput::event::relative;

/// Pasos de rueda por cada acción de scroll
const SCROLL_STEPS: i32 = 3;

/// Conjunto cerrado de acciones que puede disparar un gesto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemAction {
    Pause,
    NextTab,
    PrevTab,
    VolumeUp,
    VolumeDown,
    ScrollUp,
    ScrollDown,
    BrightnessUp,
    BrightnessDown,
    NextApp,
}

impl SystemAction {
    pub const ALL: [SystemAction; 10] = [
        SystemAction::Pause,
        SystemAction::NextTab,
        SystemAction::PrevTab,
        SystemAction::VolumeUp,
        SystemAction::VolumeDown,
        SystemAction::ScrollUp,
        SystemAction::ScrollDown,
        SystemAction::BrightnessUp,
        SystemAction::BrightnessDown,
        SystemAction::NextApp,
    ];

    /// Nombre usado en el mapa de gestos
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemAction::Pause => "pause",
            SystemAction::NextTab => "next_tab",
            SystemAction::PrevTab => "prev_tab",
            SystemAction::VolumeUp => "volume_up",
            SystemAction::VolumeDown => "volume_down",
            SystemAction::ScrollUp => "scroll_up",
            SystemAction::ScrollDown => "scroll_down",
            SystemAction::BrightnessUp => "brightness_up",
            SystemAction::BrightnessDown => "brightness_down",
            SystemAction::NextApp => "next_app",
        }
    }
}

impl fmt::Display for SystemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("acción desconocida: {0:?}")]
pub struct UnknownAction(pub String);

impl FromStr for SystemAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SystemAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Ejecutor de acciones. Nunca propaga errores: los registra y sigue.
pub trait ActionDispatcher {
    fn dispatch(&self, action: SystemAction);
}

pub struct HidOutput {
    dev: Device,
}

impl HidOutput {
    pub fn new() -> Result<Self, uinput::Error> {
        let dev = uinput::default()?
            .name("gestured-hid")?
            .event(uinput::event::Keyboard::All)?
            .event(uinput::event::Relative::Wheel(relative::Wheel::Vertical))?
            .create()?;

        Ok(HidOutput { dev })
    }

    fn sync(&mut self) -> Result<(), uinput::Error> {
        self.dev.synchronize()
    }

    fn tap(&mut self, key: keyboard::Keyboard) -> Result<(), uinput::Error> {
        self.dev.press(&key)?;
        self.sync()?;
        std::thread::sleep(Duration::from_millis(10));
        self.dev.release(&key)?;
        self.sync()
    }

    /// Pulsa los modificadores en orden, toca la tecla y los suelta en orden inverso
    fn combo(&mut self, modifiers: &[keyboard::Key], key: keyboard::Key) -> Result<(), uinput::Error> {
        for m in modifiers {
            self.dev.press(&keyboard::Keyboard::Key(*m))?;
            self.sync()?;
            std::thread::sleep(Duration::from_millis(10));
        }
        self.tap(keyboard::Keyboard::Key(key))?;
        for m in modifiers.iter().rev() {
            self.dev.release(&keyboard::Keyboard::Key(*m))?;
            self.sync()?;
        }
        Ok(())
    }

    fn scroll(&mut self, steps: i32) -> Result<(), uinput::Error> {
        self.dev.send(relative::Wheel::Vertical, steps)?;
        self.sync()
    }

    pub fn send(&mut self, action: SystemAction) -> Result<(), uinput::Error> {
        use keyboard::{Key, Keyboard, Misc};

        match action {
            SystemAction::Pause => self.tap(Keyboard::Misc(Misc::PlayPause)),
            SystemAction::NextTab => self.combo(&[Key::LeftControl], Key::Tab),
            SystemAction::PrevTab => self.combo(&[Key::LeftControl, Key::LeftShift], Key::Tab),
            SystemAction::VolumeUp => self.tap(Keyboard::Misc(Misc::VolumeUp)),
            SystemAction::VolumeDown => self.tap(Keyboard::Misc(Misc::VolumeDown)),
            SystemAction::ScrollUp => self.scroll(SCROLL_STEPS),
            SystemAction::ScrollDown => self.scroll(-SCROLL_STEPS),
            SystemAction::BrightnessUp => self.tap(Keyboard::Misc(Misc::BrightnessUp)),
            SystemAction::BrightnessDown => self.tap(Keyboard::Misc(Misc::BrightnessDown)),
            SystemAction::NextApp => self.combo(&[Key::LeftAlt], Key::Tab),
        }
    }
}

/// Despachador que envía las acciones a un hilo dedicado con el dispositivo HID,
/// para que el bucle de detección no espere a las pulsaciones
pub struct HidDispatcher {
    tx: Sender<SystemAction>,
}

impl HidDispatcher {
    pub fn spawn() -> Self {
        let (tx, rx) = unbounded::<SystemAction>();

        std::thread::Builder::new()
            .name("hid".into())
            .spawn(move || {
                let mut hid = match HidOutput::new() {
                    Ok(h) => {
                        log::info!("✅ HID inicializado (/dev/uinput)");
                        Some(h)
                    }
                    Err(e) => {
                        log::error!("❌ No se pudo inicializar HID: {}", e);
                        None
                    }
                };

                while let Ok(action) = rx.recv() {
                    match hid.as_mut() {
                        Some(hid) => match hid.send(action) {
                            Ok(()) => log::info!("Ejecutado: {}", action),
                            Err(e) => log::error!("❌ Error ejecutando {}: {}", action, e),
                        },
                        None => log::warn!("HID no disponible, acción {} descartada", action),
                    }
                }
            })
            .map(|_| ())
            .unwrap_or_else(|e| log::error!("No se pudo lanzar el hilo HID: {e}"));

        Self { tx }
    }
}

impl ActionDispatcher for HidDispatcher {
    fn dispatch(&self, action: SystemAction) {
        if self.tx.send(action).is_err() {
            log::error!("Hilo HID terminado, acción {} descartada", action);
        }
    }
}

/// Solo registra las acciones (modo `--dry-run`)
pub struct LogDispatcher;

impl ActionDispatcher for LogDispatcher {
    fn dispatch(&self, action: SystemAction) {
        log::info!("🎮 [dry-run] {}", action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for action in SystemAction::ALL {
            assert_eq!(action.as_str().parse::<SystemAction>(), Ok(action));
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            "launch_rockets".parse::<SystemAction>(),
            Err(UnknownAction("launch_rockets".into()))
        );
        assert!("Next_Tab".parse::<SystemAction>().is_err());
    }

    #[test]
    fn test_unknown_action_is_an_error() {
        let err: Box<dyn std::error::Error> = Box::new(UnknownAction("x".into()));
        assert_eq!(err.to_string(), "acción desconocida: \"x\"");
    }
}
