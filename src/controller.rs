//! Máquina de estados de la sesión: cámara, modo y grabación.
//!
//! Estado inicial: cámara apagada, modo pasivo, sin grabación. No hay estado
//! final; el bucle corre hasta que lo interrumpen desde fuera.

use std::time::{Duration, Instant};

use crate::camera::{open_with_fallback, Camera, CameraProbe};
use crate::command::Command;
use crate::dataset::validate_gesture_name;
use crate::recorder::Recorder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Passive,
    Control,
}

impl Mode {
    /// `control` activa el modo control; cualquier otro valor es pasivo
    pub fn from_name(name: &str) -> Self {
        if name == "control" {
            Mode::Control
        } else {
            Mode::Passive
        }
    }
}

/// Resultado de aplicar un comando
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    CameraStarted(CameraProbe),
    CameraAlreadyOn,
    CameraFailed,
    CameraStopped,
    ModeChanged(Mode),
    RecordingStarted(String),
    /// La cámara no se pudo encender para grabar
    RecordingAborted,
    InvalidGestureName(String),
}

pub struct SessionController {
    camera_on: bool,
    mode: Mode,
    recorder: Recorder,
    probes: Vec<CameraProbe>,
    warmup: Duration,
}

impl SessionController {
    pub fn new(recorder: Recorder, probes: Vec<CameraProbe>, warmup: Duration) -> Self {
        Self {
            camera_on: false,
            mode: Mode::Passive,
            recorder,
            probes,
            warmup,
        }
    }

    pub fn camera_on(&self) -> bool {
        self.camera_on
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn control_active(&self) -> bool {
        self.mode == Mode::Control
    }

    pub fn recording(&self) -> bool {
        self.recorder.is_active()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn apply(&mut self, command: Command, camera: &mut dyn Camera, now: Instant) -> Transition {
        match command {
            Command::StartCamera => self.start_camera(camera),
            Command::StopCamera => self.stop_camera(camera),
            Command::SetMode { mode } => {
                self.mode = Mode::from_name(&mode);
                log::info!("Modo control: {}", self.control_active());
                Transition::ModeChanged(self.mode)
            }
            Command::StartRecording { name } => self.start_recording(&name, camera, now),
        }
    }

    fn start_camera(&mut self, camera: &mut dyn Camera) -> Transition {
        if self.camera_on && camera.is_open() {
            return Transition::CameraAlreadyOn;
        }
        match open_with_fallback(camera, &self.probes) {
            Ok(probe) => {
                self.camera_on = true;
                log::info!("📷 Cámara iniciada");
                Transition::CameraStarted(probe)
            }
            Err(e) => {
                self.camera_on = false;
                log::error!("❌ {e}");
                Transition::CameraFailed
            }
        }
    }

    /// Apaga la cámara. Una grabación en curso queda en pausa hasta que se
    /// vuelva a encender.
    fn stop_camera(&mut self, camera: &mut dyn Camera) -> Transition {
        self.camera_on = false;
        if camera.is_open() {
            camera.release();
        }
        log::info!("📷 Cámara detenida");
        Transition::CameraStopped
    }

    fn start_recording(&mut self, name: &str, camera: &mut dyn Camera, now: Instant) -> Transition {
        if let Err(e) = validate_gesture_name(name) {
            log::warn!("Grabación rechazada: {e}");
            return Transition::InvalidGestureName(name.to_string());
        }

        if !self.camera_on {
            log::info!("Encendiendo la cámara para grabar...");
            if let Transition::CameraFailed = self.start_camera(camera) {
                log::error!("❌ Grabación abortada: la cámara no arrancó");
                return Transition::RecordingAborted;
            }
            if !self.warmup.is_zero() {
                std::thread::sleep(self.warmup);
            }
        }

        self.recorder.begin(name, now);
        Transition::RecordingStarted(name.to_string())
    }

    /// El bucle marca la cámara como apagada si el dispositivo desaparece
    pub fn mark_camera_lost(&mut self) {
        self.camera_on = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraBackend, CameraError, DebugView, Frame, ViewEvent};
    use crate::dataset::DatasetWriter;

    #[derive(Default)]
    struct FakeCamera {
        broken: bool,
        open: bool,
        opens: usize,
        releases: usize,
    }

    impl Camera for FakeCamera {
        fn open(&mut self, probe: CameraProbe) -> Result<(), CameraError> {
            self.opens += 1;
            if self.broken {
                return Err(CameraError::OpenFailed {
                    index: probe.index,
                    backend: probe.backend,
                    reason: "no device".into(),
                });
            }
            self.open = true;
            Ok(())
        }
        fn is_open(&self) -> bool { self.open }
        fn read(&mut self) -> Result<Frame, CameraError> { Ok(Frame::default()) }
        fn show(&mut self, _: &DebugView) -> Result<ViewEvent, CameraError> { Ok(ViewEvent::Continue) }
        fn release(&mut self) {
            self.open = false;
            self.releases += 1;
        }
    }

    fn controller(dir: &std::path::Path) -> SessionController {
        let recorder = Recorder::new(DatasetWriter::new(dir), Duration::from_millis(250), 60);
        let probes = vec![
            CameraProbe { index: 0, backend: CameraBackend::Preferred },
            CameraProbe { index: 1, backend: CameraBackend::Default },
        ];
        SessionController::new(recorder, probes, Duration::ZERO)
    }

    #[test]
    fn test_initial_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(dir.path());
        assert!(!ctl.camera_on());
        assert_eq!(ctl.mode(), Mode::Passive);
        assert!(!ctl.recording());
    }

    #[test]
    fn test_camera_start_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        let mut cam = FakeCamera::default();
        let now = Instant::now();

        assert!(matches!(ctl.apply(Command::StartCamera, &mut cam, now), Transition::CameraStarted(_)));
        assert!(ctl.camera_on());
        assert_eq!(ctl.apply(Command::StartCamera, &mut cam, now), Transition::CameraAlreadyOn);
        assert_eq!(cam.opens, 1);

        assert_eq!(ctl.apply(Command::StopCamera, &mut cam, now), Transition::CameraStopped);
        assert!(!ctl.camera_on());
        assert_eq!(cam.releases, 1);
    }

    #[test]
    fn test_camera_failure_leaves_camera_off() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        let mut cam = FakeCamera { broken: true, ..Default::default() };
        assert_eq!(ctl.apply(Command::StartCamera, &mut cam, Instant::now()), Transition::CameraFailed);
        assert!(!ctl.camera_on());
        assert_eq!(cam.opens, 2);
    }

    #[test]
    fn test_mode_is_independent_of_camera() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        let mut cam = FakeCamera::default();
        let now = Instant::now();
        ctl.apply(Command::SetMode { mode: "control".into() }, &mut cam, now);
        assert!(ctl.control_active());
        assert!(!ctl.camera_on());
        ctl.apply(Command::SetMode { mode: "whatever".into() }, &mut cam, now);
        assert_eq!(ctl.mode(), Mode::Passive);
    }

    #[test]
    fn test_recording_auto_starts_camera() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        let mut cam = FakeCamera::default();
        let t = ctl.apply(Command::StartRecording { name: "wave".into() }, &mut cam, Instant::now());
        assert_eq!(t, Transition::RecordingStarted("wave".into()));
        assert!(ctl.camera_on());
        assert!(ctl.recording());
        assert_eq!(ctl.recorder().gesture(), Some("wave"));
    }

    #[test]
    fn test_recording_aborted_without_camera() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        let mut cam = FakeCamera { broken: true, ..Default::default() };
        let t = ctl.apply(Command::StartRecording { name: "wave".into() }, &mut cam, Instant::now());
        assert_eq!(t, Transition::RecordingAborted);
        assert!(!ctl.recording());
        assert!(!ctl.camera_on());
    }

    #[test]
    fn test_recording_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        let mut cam = FakeCamera::default();
        let t = ctl.apply(Command::StartRecording { name: "../etc".into() }, &mut cam, Instant::now());
        assert_eq!(t, Transition::InvalidGestureName("../etc".into()));
        assert!(!ctl.recording());
        assert_eq!(cam.opens, 0);
    }
}
