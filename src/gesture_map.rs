//! Mapa gesto → acción (`gesture_map.json`).
//!
//! El detector solo lo lee; la escritura la hace la API o `gesturectl`.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GestureMap {
    entries: BTreeMap<String, String>,
}

impl GestureMap {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parsea el documento completo; un error no modifica nada
    pub fn parse(contents: &str) -> Result<Self> {
        let entries: BTreeMap<String, String> =
            serde_json::from_str(contents).context("Mapa de gestos inválido")?;
        Ok(Self { entries })
    }

    /// Carga el mapa. Un archivo inexistente equivale a un mapa vacío.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("No se pudo leer {:?}", path)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path).with_context(|| format!("No se pudo escribir {:?}", path))?;
        Ok(())
    }

    pub fn action_for(&self, gesture: &str) -> Option<&str> {
        self.entries.get(gesture).map(String::as_str)
    }

    /// Inserta o reemplaza; devuelve la acción anterior
    pub fn set(&mut self, gesture: &str, action: &str) -> Option<String> {
        self.entries.insert(gesture.to_string(), action.to_string())
    }

    pub fn remove(&mut self, gesture: &str) -> Option<String> {
        self.entries.remove(gesture)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_document() {
        let map = GestureMap::parse(r#"{"fist":"pause","palm":"volume_up"}"#).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.action_for("fist"), Some("pause"));
        assert_eq!(map.action_for("peace"), None);
    }

    #[test]
    fn test_rejects_nested_values() {
        assert!(GestureMap::parse(r#"{"fist":{"a":1}}"#).is_err());
        assert!(GestureMap::parse("[]").is_err());
    }

    #[test]
    fn test_missing_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let map = GestureMap::load(&dir.path().join("gesture_map.json")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_edit_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_map.json");
        let mut map = GestureMap::default();
        assert_eq!(map.set("fist", "pause"), None);
        assert_eq!(map.set("fist", "next_tab"), Some("pause".into()));
        map.set("palm", "scroll_up");
        map.remove("palm");
        map.save(&path).unwrap();

        let loaded = GestureMap::load(&path).unwrap();
        assert_eq!(loaded, GestureMap::from_entries([("fist", "next_tab")]));
    }
}
