/// Índices de puntos clave de la mano (convención de MediaPipe Hands)
pub mod keypoints {
    /// Punto de referencia del swipe
    pub const WRIST: usize = 0;
}

/// Constantes del sistema
pub const NUM_KEYPOINTS: usize = 21;
pub const COORDS_PER_KEYPOINT: usize = 2; // x, y
pub const LANDMARK_VECTOR_LEN: usize = NUM_KEYPOINTS * COORDS_PER_KEYPOINT; // 42

/// Un punto clave con coordenadas normalizadas (0.0 a 1.0 respecto a la imagen)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Profundidad relativa a la muñeca (no se usa en el vector de características)
    pub z: f32,
}

/// Mano detectada en un frame con sus 21 puntos clave
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    pub landmarks: [Landmark; NUM_KEYPOINTS],
    /// Confianza del detector (0.0 a 1.0)
    pub score: f32,
    /// "Left" o "Right"
    pub handedness: String,
}

/// Vector de características de un frame: [x0, y0, x1, y1, ..., x20, y20]
///
/// Solo se construye cuando hay una mano en el frame, y su longitud es siempre
/// `LANDMARK_VECTOR_LEN`.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkVector(Vec<f32>);

impl LandmarkVector {
    /// Aplana los puntos clave de una mano
    pub fn from_hand(hand: &HandLandmarks) -> Self {
        let mut flat = Vec::with_capacity(LANDMARK_VECTOR_LEN);
        for lm in hand.landmarks.iter() {
            flat.push(lm.x);
            flat.push(lm.y);
        }
        Self(flat)
    }

    /// Reconstruye un vector desde valores ya aplanados (p.ej. una fila de CSV)
    pub fn from_values(values: Vec<f32>) -> Option<Self> {
        if values.len() == LANDMARK_VECTOR_LEN {
            Some(Self(values))
        } else {
            None
        }
    }

    /// Coordenada x del punto de referencia (muñeca)
    pub fn reference_x(&self) -> f32 {
        self.0[keypoints::WRIST * COORDS_PER_KEYPOINT]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn hand_at(wrist_x: f32) -> HandLandmarks {
    let mut landmarks = [Landmark::default(); NUM_KEYPOINTS];
    for (i, lm) in landmarks.iter_mut().enumerate() {
        lm.x = wrist_x + i as f32 * 0.001;
        lm.y = 0.5 + i as f32 * 0.01;
    }
    landmarks[keypoints::WRIST].x = wrist_x;
    HandLandmarks {
        landmarks,
        score: 0.95,
        handedness: "Right".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_has_fixed_length() {
        let v = LandmarkVector::from_hand(&hand_at(0.4));
        assert_eq!(v.len(), LANDMARK_VECTOR_LEN);
        assert_eq!(v.reference_x(), 0.4);
    }

    #[test]
    fn test_from_values_rejects_wrong_length() {
        assert!(LandmarkVector::from_values(vec![0.0; 41]).is_none());
        assert!(LandmarkVector::from_values(vec![0.0; 42]).is_some());
    }
}
