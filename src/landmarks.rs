use crate::camera::Frame;
use crate::types::{LandmarkVector, LANDMARK_VECTOR_LEN};

/// Convierte el frame capturado en un vector de características, o nada si no hay mano
pub struct LandmarkExtractor {
    min_score: f32,
}

impl LandmarkExtractor {
    pub fn new(min_score: f32) -> Self {
        Self {
            min_score: min_score.clamp(0.0, 1.0),
        }
    }

    pub fn extract(&self, frame: &Frame) -> Option<LandmarkVector> {
        let hand = frame.hand.as_ref()?;
        if hand.score < self.min_score {
            log::debug!("Mano descartada (score={:.2})", hand.score);
            return None;
        }
        let vector = LandmarkVector::from_hand(hand);
        debug_assert_eq!(vector.len(), LANDMARK_VECTOR_LEN);
        Some(vector)
    }
}

impl Default for LandmarkExtractor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hand_at;

    #[test]
    fn test_no_hand_gives_none() {
        let extractor = LandmarkExtractor::default();
        assert!(extractor.extract(&Frame::default()).is_none());
    }

    #[test]
    fn test_low_score_hand_is_ignored() {
        let extractor = LandmarkExtractor::new(0.8);
        let mut hand = hand_at(0.5);
        hand.score = 0.6;
        assert!(extractor.extract(&Frame { hand: Some(hand) }).is_none());
    }

    #[test]
    fn test_hand_gives_flat_vector() {
        let extractor = LandmarkExtractor::default();
        let v = extractor.extract(&Frame { hand: Some(hand_at(0.25)) }).unwrap();
        assert_eq!(v.len(), 42);
        assert_eq!(v.reference_x(), 0.25);
        assert_eq!(v.as_slice()[1], 0.5);
    }
}
