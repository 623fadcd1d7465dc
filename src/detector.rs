//! Bucle principal de detección.
//!
//! Un solo hilo, por sondeo. En cada iteración:
//! 1. cada `poll_interval`: comandos, estado con cámara apagada y recargas en caliente
//! 2. con la cámara encendida: leer frame y extraer landmarks
//! 3. según el estado: grabador, swipe o clasificador
//! 4. vista de depuración
//!
//! Ningún error termina el bucle; solo la tecla Esc en la vista de depuración.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::actions::{ActionDispatcher, SystemAction};
use crate::camera::{Camera, DebugView, ViewEvent};
use crate::classifier::{load_model, Classification, ClassifierBridge, DispatchDecision, GestureModel};
use crate::command::{Command, CommandSource};
use crate::config::Config;
use crate::controller::{SessionController, Transition};
use crate::dataset::DatasetWriter;
use crate::gesture_map::GestureMap;
use crate::landmarks::LandmarkExtractor;
use crate::recorder::{RecordOutcome, Recorder};
use crate::reload::Reloadable;
use crate::status::{timestamp_string, ActionLog, ActionLogEntry, StatusPublisher, StatusSnapshot};
use crate::swipe::{SwipeDetector, SwipeDirection};
use crate::types::LandmarkVector;

pub type ModelSlot = Option<Box<dyn GestureModel>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cámara apagada
    Idle,
    FrameProcessed,
    /// Fallo transitorio al leer el frame
    ReadFailed,
    /// Esc en la vista de depuración
    Abort,
}

pub struct Detector {
    config: Config,
    camera: Box<dyn Camera>,
    commands: Box<dyn CommandSource>,
    dispatcher: Box<dyn ActionDispatcher>,
    controller: SessionController,
    extractor: LandmarkExtractor,
    swipe: SwipeDetector,
    bridge: ClassifierBridge,
    gesture_map: Reloadable<GestureMap>,
    model: Reloadable<ModelSlot>,
    status: StatusPublisher,
    action_log: ActionLog,
    last_poll: Option<Instant>,
}

impl Detector {
    /// Crea el detector con un cargador de modelo arbitrario
    pub fn new(
        config: Config,
        camera: Box<dyn Camera>,
        commands: Box<dyn CommandSource>,
        dispatcher: Box<dyn ActionDispatcher>,
        mut model_loader: impl FnMut(&Path) -> anyhow::Result<Box<dyn GestureModel>> + 'static,
    ) -> Self {
        let recorder = Recorder::new(
            DatasetWriter::new(&config.paths.dataset_dir),
            config.sample_interval(),
            config.recording.target_samples,
        );
        let controller = SessionController::new(
            recorder,
            config.camera.probes.clone(),
            Duration::from_millis(config.recording.camera_warmup_ms),
        );

        let mut gesture_map = Reloadable::new(
            "Mapa de gestos",
            &config.paths.gesture_map,
            GestureMap::default(),
            |path| GestureMap::load(path),
        );
        let mut model: Reloadable<ModelSlot> = Reloadable::new(
            "Modelo",
            &config.paths.model,
            None,
            move |path| model_loader(path).map(Some),
        );
        gesture_map.refresh();
        model.refresh();
        log::info!("Mapa cargado: {} gestos", gesture_map.get().len());
        if model.get().is_none() {
            log::warn!("Modelo no disponible en {:?}", config.paths.model);
        }

        Self {
            extractor: LandmarkExtractor::new(config.camera.min_hand_score),
            swipe: SwipeDetector::new(
                config.swipe.history,
                config.swipe.threshold,
                config.swipe_cooldown(),
            ),
            bridge: ClassifierBridge::new(
                config.classifier.display_threshold,
                config.classifier.action_threshold,
            ),
            status: StatusPublisher::new(&config.paths.status, config.status_throttle()),
            action_log: ActionLog::new(config.detector.action_log_capacity),
            camera,
            commands,
            dispatcher,
            controller,
            gesture_map,
            model,
            last_poll: None,
            config,
        }
    }

    /// Detector con el modelo ONNX de `paths.model` + `paths.classes`
    pub fn with_onnx_model(
        config: Config,
        camera: Box<dyn Camera>,
        commands: Box<dyn CommandSource>,
        dispatcher: Box<dyn ActionDispatcher>,
    ) -> Self {
        let classes: PathBuf = config.paths.classes.clone();
        Self::new(config, camera, commands, dispatcher, move |path| {
            load_model(path, &classes)
        })
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn gesture_map(&self) -> &GestureMap {
        self.gesture_map.get()
    }

    pub fn model_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn action_log(&self) -> &ActionLog {
        &self.action_log
    }

    /// Corre hasta Esc en la vista de depuración
    pub fn run(&mut self) {
        log::info!("Detector iniciado... esperando comandos");
        let idle_sleep = Duration::from_millis(self.config.detector.idle_sleep_ms);
        let retry_sleep = Duration::from_millis(self.config.detector.read_retry_ms);

        loop {
            match self.tick(Instant::now()) {
                TickOutcome::Idle => std::thread::sleep(idle_sleep),
                TickOutcome::ReadFailed => std::thread::sleep(retry_sleep),
                TickOutcome::FrameProcessed => {}
                TickOutcome::Abort => {
                    log::info!("👋 Saliendo (Esc)");
                    break;
                }
            }
        }

        if self.camera.is_open() {
            self.camera.release();
        }
    }

    /// Una iteración del bucle
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let poll_due = self
            .last_poll
            .map(|last| now.saturating_duration_since(last) > self.config.poll_interval())
            .unwrap_or(true);
        if poll_due {
            self.last_poll = Some(now);
            self.poll(now);
        }

        if !self.controller.camera_on() {
            return TickOutcome::Idle;
        }
        if !self.camera.is_open() {
            self.on_camera_lost(now);
            return TickOutcome::Idle;
        }

        let frame = match self.camera.read() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Error: no se pudo leer frame de la cámara: {e}");
                if !self.camera.is_open() {
                    self.on_camera_lost(now);
                }
                return TickOutcome::ReadFailed;
            }
        };

        let vector = self.extractor.extract(&frame);
        let mut view = DebugView::default();
        self.process_frame(vector.as_ref(), now, &mut view);

        if self.config.camera.show_preview {
            match self.camera.show(&view) {
                Ok(ViewEvent::Abort) => return TickOutcome::Abort,
                Ok(ViewEvent::Continue) => {}
                Err(e) => {
                    log::debug!("Vista de depuración no disponible: {e}");
                    if !self.camera.is_open() {
                        self.on_camera_lost(now);
                    }
                }
            }
        }

        TickOutcome::FrameProcessed
    }

    /// El dispositivo se cerró sin `stop_camera` (subproceso caído, desconexión)
    fn on_camera_lost(&mut self, now: Instant) {
        log::error!("❌ Cámara perdida");
        self.controller.mark_camera_lost();
        self.swipe.reset();
        let snapshot = self.snapshot(None, 0.0);
        self.status.publish(&snapshot, now);
    }

    /// Tareas de cadencia fija: comandos, estado en reposo y recargas
    fn poll(&mut self, now: Instant) {
        if let Some(command) = self.commands.poll() {
            self.apply(command, now);
        }

        if !self.controller.camera_on() {
            let snapshot = self.snapshot(None, 0.0);
            self.status.publish(&snapshot, now);
        }

        self.gesture_map.refresh();
        self.model.refresh();
    }

    fn apply(&mut self, command: Command, now: Instant) {
        let transition = self.controller.apply(command, self.camera.as_mut(), now);
        log::debug!("Transición: {:?}", transition);
        match transition {
            Transition::CameraStarted(_) | Transition::CameraStopped | Transition::RecordingStarted(_) => {
                self.swipe.reset();
            }
            _ => {}
        }
        let snapshot = self.snapshot(None, 0.0);
        self.status.publish(&snapshot, now);
    }

    fn process_frame(&mut self, vector: Option<&LandmarkVector>, now: Instant, view: &mut DebugView) {
        if self.controller.recording() {
            self.record(vector, now, view);
            return;
        }

        let Some(vector) = vector else {
            return;
        };
        view.draw_landmarks = true;

        if let Some(direction) = self.swipe.update(vector.reference_x(), now) {
            self.on_swipe(direction, now, view);
            return;
        }

        self.classify(vector, now, view);
    }

    fn record(&mut self, vector: Option<&LandmarkVector>, now: Instant, view: &mut DebugView) {
        let gesture = self.controller.recorder().gesture().unwrap_or_default().to_string();
        let Some(vector) = vector else {
            view.push_line(format!("RECORDING: {gesture} (sin mano)"));
            return;
        };
        view.draw_landmarks = true;

        let recorder = self.controller.recorder_mut();
        match recorder.push(vector, now) {
            RecordOutcome::Completed(saved) => {
                view.push_line(format!("GUARDADO: {} #{}", gesture, saved.meta.sample_id));
                let snapshot = self.snapshot(None, 0.0);
                self.status.publish(&snapshot, now);
            }
            RecordOutcome::Failed => {
                view.push_line(format!("ERROR guardando {gesture}"));
            }
            _ => {
                view.push_line(format!(
                    "RECORDING: {} ({}/{})",
                    gesture,
                    recorder.len(),
                    recorder.target()
                ));
                view.progress = Some(recorder.progress());
            }
        }
    }

    fn on_swipe(&mut self, direction: SwipeDirection, now: Instant, view: &mut DebugView) {
        let action = match direction {
            SwipeDirection::Left => SystemAction::NextTab,
            SwipeDirection::Right => SystemAction::PrevTab,
        };
        view.push_line(direction.label().to_uppercase());

        if self.config.swipe.requires_control && !self.controller.control_active() {
            log::info!("{} (pasivo, sin acción)", direction.label());
        } else {
            log::info!("{} -> {}", direction.label(), action);
            self.dispatcher.dispatch(action);
            self.action_log
                .push(ActionLogEntry::now(format!("{} (Swipe)", action)));
        }

        let snapshot = self.snapshot(Some(direction.label().to_string()), 1.0);
        self.status.publish(&snapshot, now);
    }

    fn classify(&mut self, vector: &LandmarkVector, now: Instant, view: &mut DebugView) {
        let Some(model) = self.model.get_mut().as_mut() else {
            return;
        };

        let classification = match self.bridge.classify(
            model.as_mut(),
            vector,
            self.gesture_map.get(),
            self.controller.control_active(),
            self.controller.recording(),
        ) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("Error clasificando: {e}");
                return;
            }
        };

        let Classification::Mapped {
            prediction,
            action_name,
            current_gesture,
            decision,
        } = classification
        else {
            return;
        };

        let snapshot = self.snapshot(current_gesture, prediction.confidence);
        self.status.publish_throttled(&snapshot, now);

        let mut text = format!("Gesture: {} ({:.2})", prediction.label, prediction.confidence);
        match decision {
            DispatchDecision::Dispatch(action) => {
                text.push_str(&format!(" -> {}", action));
                self.dispatcher.dispatch(action);
                self.action_log.push(ActionLogEntry::now(action.as_str()));
            }
            DispatchDecision::Passive => text.push_str(" (Passive)"),
            DispatchDecision::UnknownAction(name) => {
                log::warn!("Acción desconocida '{}' para el gesto '{}'", name, prediction.label);
            }
            DispatchDecision::Recording | DispatchDecision::BelowThreshold => {
                log::trace!("'{}' -> {} sin ejecutar", prediction.label, action_name);
            }
        }
        view.push_line(text);
    }

    fn snapshot(&self, current_gesture: Option<String>, confidence: f32) -> StatusSnapshot {
        StatusSnapshot {
            recording: self.controller.recording(),
            current_gesture,
            confidence,
            model_loaded: self.model.get().is_some(),
            camera_on: self.controller.camera_on(),
            control_active: self.controller.control_active(),
            last_update: timestamp_string(),
            action_log: self.action_log.entries(),
        }
    }
}
