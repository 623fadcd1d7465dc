//! Partición de datos por gesto: `dataset/<gesto>/sample_<id>.csv` + `meta_<id>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{LandmarkVector, LANDMARK_VECTOR_LEN, NUM_KEYPOINTS};

/// Archivo con el siguiente identificador libre de cada gesto
const COUNTER_FILE: &str = ".next_id";

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Nombre de gesto inválido: {0:?}")]
    InvalidName(String),

    #[error("Muestra vacía")]
    EmptySample,
}

/// Metadatos de una muestra grabada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMeta {
    pub gesture: String,
    pub sample_id: u64,
    pub frames: usize,
    pub duration_seconds: f64,
    /// Marca de tiempo (segundos Unix) de cada vector aceptado
    pub timestamps: Vec<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct SavedSample {
    pub sample_path: PathBuf,
    pub meta_path: PathBuf,
    pub meta: SampleMeta,
}

/// El nombre del gesto se usa como directorio: no puede escapar de la raíz
pub fn validate_gesture_name(name: &str) -> Result<(), DatasetError> {
    let trimmed = name.trim();
    let bad = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed != name;
    if bad {
        return Err(DatasetError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn header() -> Vec<String> {
    let mut cols = Vec::with_capacity(LANDMARK_VECTOR_LEN + 1);
    cols.push("sample".to_string());
    for k in 0..NUM_KEYPOINTS {
        cols.push(format!("x{k}"));
        cols.push(format!("y{k}"));
    }
    cols
}

/// Escritor de muestras con identificadores monótonos por gesto
pub struct DatasetWriter {
    root: PathBuf,
}

impl DatasetWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn gesture_dir(&self, gesture: &str) -> PathBuf {
        self.root.join(gesture)
    }

    /// Reserva el siguiente identificador: nunca reutiliza uno existente aunque
    /// se hayan borrado muestras intermedias.
    fn allocate_id(&self, dir: &Path) -> Result<u64, DatasetError> {
        let counter_path = dir.join(COUNTER_FILE);
        let from_counter = fs::read_to_string(&counter_path)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let from_listing = existing_ids(dir)?
            .into_iter()
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        let id = from_counter.max(from_listing);
        fs::write(&counter_path, (id + 1).to_string())?;
        Ok(id)
    }

    /// Persiste los vectores y sus metadatos
    pub fn save(
        &self,
        gesture: &str,
        samples: &[LandmarkVector],
        timestamps: Vec<f64>,
        duration_seconds: f64,
    ) -> Result<SavedSample, DatasetError> {
        validate_gesture_name(gesture)?;
        if samples.is_empty() {
            return Err(DatasetError::EmptySample);
        }

        let dir = self.gesture_dir(gesture);
        fs::create_dir_all(&dir)?;
        let sample_id = self.allocate_id(&dir)?;

        let sample_path = dir.join(format!("sample_{sample_id}.csv"));
        write_sample(&sample_path, samples)?;

        let meta = SampleMeta {
            gesture: gesture.to_string(),
            sample_id,
            frames: samples.len(),
            duration_seconds,
            timestamps,
            created_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        };
        let meta_path = dir.join(format!("meta_{sample_id}.json"));
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)?;

        Ok(SavedSample {
            sample_path,
            meta_path,
            meta,
        })
    }
}

fn existing_ids(dir: &Path) -> Result<Vec<u64>, DatasetError> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(id) = name
            .strip_prefix("sample_")
            .and_then(|rest| rest.strip_suffix(".csv"))
            .and_then(|id| id.parse::<u64>().ok())
        {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Escribe una muestra: una fila por vector, `sample,x0,y0,...,x20,y20`
pub fn write_sample(path: &Path, samples: &[LandmarkVector]) -> Result<(), DatasetError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(header())?;
    for (idx, vector) in samples.iter().enumerate() {
        let mut record = Vec::with_capacity(LANDMARK_VECTOR_LEN + 1);
        record.push(idx.to_string());
        record.extend(vector.as_slice().iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Carga los vectores de una muestra grabada
pub fn load_sample(path: impl AsRef<Path>) -> Result<Vec<LandmarkVector>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut vectors = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() != LANDMARK_VECTOR_LEN + 1 {
            bail!(
                "La fila {} tiene {} columnas, se esperaban {}",
                row_idx + 1,
                record.len(),
                LANDMARK_VECTOR_LEN + 1
            );
        }
        let values = record
            .iter()
            .skip(1)
            .map(|v| v.parse::<f32>())
            .collect::<std::result::Result<Vec<f32>, _>>()
            .with_context(|| format!("Valor no numérico en fila {}", row_idx + 1))?;
        let vector = LandmarkVector::from_values(values)
            .ok_or_else(|| anyhow!("Longitud inválida en fila {}", row_idx + 1))?;
        vectors.push(vector);
    }

    if vectors.is_empty() {
        return Err(anyhow!("El CSV {:?} no contiene datos", path));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hand_at;

    fn vectors(n: usize) -> Vec<LandmarkVector> {
        (0..n)
            .map(|i| LandmarkVector::from_hand(&hand_at(i as f32 / 100.0)))
            .collect()
    }

    #[test]
    fn test_save_and_reload_sample() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path());
        let saved = writer.save("wave", &vectors(3), vec![1.0, 1.25, 1.5], 0.5).unwrap();

        assert_eq!(saved.meta.sample_id, 0);
        assert_eq!(saved.meta.frames, 3);
        assert!(saved.sample_path.ends_with("wave/sample_0.csv"));

        let loaded = load_sample(&saved.sample_path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].reference_x(), 0.02);

        let meta: SampleMeta =
            serde_json::from_str(&fs::read_to_string(&saved.meta_path).unwrap()).unwrap();
        assert_eq!(meta, saved.meta);
    }

    #[test]
    fn test_ids_are_not_reused_after_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path());
        let a = writer.save("fist", &vectors(1), vec![0.0], 0.0).unwrap();
        let b = writer.save("fist", &vectors(1), vec![0.0], 0.0).unwrap();
        assert_eq!((a.meta.sample_id, b.meta.sample_id), (0, 1));

        fs::remove_file(&a.sample_path).unwrap();
        let c = writer.save("fist", &vectors(1), vec![0.0], 0.0).unwrap();
        assert_eq!(c.meta.sample_id, 2);
        assert!(b.sample_path.exists());
    }

    #[test]
    fn test_ids_skip_files_written_by_others() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path());
        let gdir = writer.gesture_dir("palm");
        fs::create_dir_all(&gdir).unwrap();
        fs::write(gdir.join("sample_7.csv"), "").unwrap();

        let saved = writer.save("palm", &vectors(1), vec![0.0], 0.0).unwrap();
        assert_eq!(saved.meta.sample_id, 8);
    }

    #[test]
    fn test_invalid_gesture_names() {
        for name in ["", "..", "a/b", "a\\b", " wave"] {
            assert!(validate_gesture_name(name).is_err(), "{name:?}");
        }
        assert!(validate_gesture_name("thumbs_up").is_ok());
    }
}
