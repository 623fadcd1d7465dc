use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::actions::SystemAction;
use crate::gesture_map::GestureMap;
use crate::types::{LandmarkVector, LANDMARK_VECTOR_LEN};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("Model returned no classes")]
    NoClasses,
}

/// Etiqueta más probable y su probabilidad
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Clasificador entrenado: vector de landmarks → (etiqueta, confianza)
pub trait GestureModel {
    fn predict(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError>;
}

/// `classes.json`: admite el formato `{"index_to_class": {"0": "fist"}}` o una lista
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassesJson {
    Indexed { index_to_class: HashMap<String, String> },
    List(Vec<String>),
}

fn load_classes(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let content = fs::read_to_string(path)?;
    let data: ClassesJson = serde_json::from_str(&content)?;

    let labels = match data {
        ClassesJson::List(labels) => labels,
        ClassesJson::Indexed { index_to_class } => {
            // Convertir HashMap a Vec ordenado por índice
            let mut pairs: Vec<(usize, String)> = index_to_class
                .into_iter()
                .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
                .collect();
            pairs.sort_by_key(|(idx, _)| *idx);
            pairs.into_iter().map(|(_, name)| name).collect()
        }
    };

    if labels.is_empty() {
        return Err(ClassifierError::NoClasses);
    }
    Ok(labels)
}

/// Modelo ONNX (exportado del clasificador entrenado) con sus clases
pub struct OnnxGestureModel {
    session: Session,
    labels: Vec<String>,
    input_name: String,
    prob_output_name: String,
}

impl OnnxGestureModel {
    pub fn new(model_path: &Path, classes_path: &Path) -> Result<Self, ClassifierError> {
        let labels = load_classes(classes_path)?;

        let session = Session::builder()?.commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or(ClassifierError::MissingIo { kind: "input" })?;

        // Los exportadores de scikit-learn emiten la etiqueta (int64/string) y las
        // probabilidades (float): nos quedamos con el tensor float
        let candidates: Vec<(&str, bool)> = session
            .outputs
            .iter()
            .map(|output| {
                let is_float = matches!(
                    output.output_type,
                    ValueType::Tensor {
                        ty: TensorElementType::Float32,
                        ..
                    }
                );
                (output.name.as_str(), is_float)
            })
            .collect();
        let (name, is_float) =
            probability_output(&candidates).ok_or(ClassifierError::MissingIo { kind: "output" })?;
        if !is_float {
            log::error!(
                "[ONNX] {:?} no tiene salida float32 de probabilidades (¿exportado con zipmap?). \
                 Usando '{}', la inferencia fallará",
                model_path,
                name
            );
        }
        let prob_output_name = name.to_string();

        log::info!("[ONNX] Modelo cargado: {:?}", model_path);
        log::info!("[ONNX] Clases: {:?}", labels);
        log::debug!("[ONNX] Input: {} / Output: {}", input_name, prob_output_name);

        Ok(Self {
            session,
            labels,
            input_name,
            prob_output_name,
        })
    }

    /// Probabilidades para todas las clases
    pub fn predict_scores(
        &mut self,
        features: &[f32],
    ) -> Result<HashMap<String, f32>, ClassifierError> {
        if features.len() != LANDMARK_VECTOR_LEN {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: LANDMARK_VECTOR_LEN,
                actual: features.len(),
            });
        }

        // Tensor de entrada [1, 42]
        let shape_vec = vec![1_usize, LANDMARK_VECTOR_LEN];
        let input_value = ort::value::Value::from_array((shape_vec, features.to_vec()))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (prob_shape, prob_data) =
            outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

        let class_count = num_classes(prob_shape);

        let mut scores = HashMap::new();
        for (i, label) in self.labels.iter().enumerate().take(class_count) {
            if let Some(&score) = prob_data.get(i) {
                scores.insert(label.clone(), score);
            }
        }

        Ok(scores)
    }
}

impl GestureModel for OnnxGestureModel {
    fn predict(&mut self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        let scores = self.predict_scores(features)?;
        scores
            .into_iter()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(label, confidence)| Prediction { label, confidence })
            .ok_or(ClassifierError::NoOutputTensor)
    }
}

/// Clases en un tensor [1, n] o [n]; un escalar no trae probabilidades
fn num_classes(shape: &[i64]) -> usize {
    shape.last().copied().unwrap_or(0).max(0) as usize
}

/// Primera salida float32; si no hay, la primera salida marcada como no float
fn probability_output<'a>(outputs: &[(&'a str, bool)]) -> Option<(&'a str, bool)> {
    outputs
        .iter()
        .find(|(_, is_float)| *is_float)
        .or_else(|| outputs.first())
        .copied()
}

/// Carga el modelo ONNX y su archivo de clases
pub fn load_model(model_path: &Path, classes_path: &Path) -> anyhow::Result<Box<dyn GestureModel>> {
    let model = OnnxGestureModel::new(model_path, classes_path)?;
    Ok(Box::new(model))
}

// ── Puente clasificador → acción ───────────────────────────────────────────

/// Qué hacer con la acción mapeada de un gesto reconocido
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchDecision {
    Dispatch(SystemAction),
    /// Modo pasivo: se muestra pero no se ejecuta
    Passive,
    Recording,
    BelowThreshold,
    /// El mapa apunta a una acción que no existe
    UnknownAction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// La etiqueta no está en el mapa: no se hace nada
    Unmapped(Prediction),
    Mapped {
        prediction: Prediction,
        action_name: String,
        /// Gesto a publicar en el estado (solo sobre el umbral de visualización)
        current_gesture: Option<String>,
        decision: DispatchDecision,
    },
}

pub struct ClassifierBridge {
    display_threshold: f32,
    action_threshold: f32,
}

impl ClassifierBridge {
    pub fn new(display_threshold: f32, action_threshold: f32) -> Self {
        Self {
            display_threshold,
            action_threshold,
        }
    }

    /// Clasifica un vector y decide si su acción debe ejecutarse
    pub fn classify(
        &self,
        model: &mut dyn GestureModel,
        vector: &LandmarkVector,
        map: &GestureMap,
        control_active: bool,
        recording: bool,
    ) -> Result<Classification, ClassifierError> {
        let prediction = model.predict(vector.as_slice())?;
        Ok(self.decide(prediction, map, control_active, recording))
    }

    pub fn decide(
        &self,
        prediction: Prediction,
        map: &GestureMap,
        control_active: bool,
        recording: bool,
    ) -> Classification {
        let Some(action_name) = map.action_for(&prediction.label).map(str::to_string) else {
            return Classification::Unmapped(prediction);
        };

        let current_gesture =
            (prediction.confidence > self.display_threshold).then(|| prediction.label.clone());

        let decision = if !control_active {
            DispatchDecision::Passive
        } else if recording {
            DispatchDecision::Recording
        } else if prediction.confidence <= self.action_threshold {
            DispatchDecision::BelowThreshold
        } else {
            match action_name.parse::<SystemAction>() {
                Ok(action) => DispatchDecision::Dispatch(action),
                Err(_) => DispatchDecision::UnknownAction(action_name.clone()),
            }
        };

        Classification::Mapped {
            prediction,
            action_name,
            current_gesture,
            decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> ClassifierBridge {
        ClassifierBridge::new(0.6, 0.7)
    }

    fn map() -> GestureMap {
        GestureMap::from_entries([("fist", "pause"), ("rock", "headbang")])
    }

    fn pred(label: &str, confidence: f32) -> Prediction {
        Prediction { label: label.into(), confidence }
    }

    #[test]
    fn test_unmapped_label_does_nothing() {
        let out = bridge().decide(pred("peace", 0.99), &map(), true, false);
        assert!(matches!(out, Classification::Unmapped(_)));
    }

    #[test]
    fn test_display_only_between_thresholds() {
        let out = bridge().decide(pred("fist", 0.65), &map(), true, false);
        let Classification::Mapped { current_gesture, decision, .. } = out else { panic!() };
        assert_eq!(current_gesture.as_deref(), Some("fist"));
        assert_eq!(decision, DispatchDecision::BelowThreshold);
    }

    #[test]
    fn test_low_confidence_clears_current_gesture() {
        let out = bridge().decide(pred("fist", 0.5), &map(), true, false);
        let Classification::Mapped { current_gesture, .. } = out else { panic!() };
        assert!(current_gesture.is_none());
    }

    #[test]
    fn test_dispatch_requires_control_and_idle() {
        let b = bridge();
        let decision = |control, recording| match b.decide(pred("fist", 0.75), &map(), control, recording) {
            Classification::Mapped { decision, .. } => decision,
            other => panic!("{other:?}"),
        };
        assert_eq!(decision(true, false), DispatchDecision::Dispatch(SystemAction::Pause));
        assert_eq!(decision(false, false), DispatchDecision::Passive);
        assert_eq!(decision(true, true), DispatchDecision::Recording);
    }

    #[test]
    fn test_unknown_action_name_is_not_dispatched() {
        let out = bridge().decide(pred("rock", 0.9), &map(), true, false);
        let Classification::Mapped { decision, .. } = out else { panic!() };
        assert_eq!(decision, DispatchDecision::UnknownAction("headbang".into()));
    }

    #[test]
    fn test_num_classes_from_shape() {
        assert_eq!(num_classes(&[1, 4]), 4);
        assert_eq!(num_classes(&[3]), 3);
        assert_eq!(num_classes(&[]), 0);
    }

    #[test]
    fn test_probability_output_prefers_float_tensor() {
        let outputs = [("output_label", false), ("output_probability", true)];
        assert_eq!(probability_output(&outputs), Some(("output_probability", true)));
    }

    #[test]
    fn test_probability_output_without_float_tensor() {
        // Exportación con ZipMap: solo etiqueta + seq(map)
        let outputs = [("output_label", false), ("output_probability", false)];
        assert_eq!(probability_output(&outputs), Some(("output_label", false)));
        assert_eq!(probability_output(&[]), None);
    }

    #[test]
    fn test_classes_json_formats() {
        let dir = tempfile::tempdir().unwrap();
        let indexed = dir.path().join("a.json");
        fs::write(&indexed, r#"{"index_to_class":{"1":"palm","0":"fist"}}"#).unwrap();
        assert_eq!(load_classes(&indexed).unwrap(), vec!["fist", "palm"]);

        let list = dir.path().join("b.json");
        fs::write(&list, r#"["fist","palm","peace"]"#).unwrap();
        assert_eq!(load_classes(&list).unwrap().len(), 3);

        let empty = dir.path().join("c.json");
        fs::write(&empty, "[]").unwrap();
        assert!(matches!(load_classes(&empty), Err(ClassifierError::NoClasses)));
    }
}
