use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// La mano se movió hacia x menores
    Left,
    /// La mano se movió hacia x mayores
    Right,
}

impl SwipeDirection {
    pub fn label(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "Swipe Left",
            SwipeDirection::Right => "Swipe Right",
        }
    }
}

/// Detector de swipe horizontal sobre el historial de x de la muñeca,
/// independiente del modelo entrenado
pub struct SwipeDetector {
    history: VecDeque<f32>,
    capacity: usize,
    threshold: f32,
    cooldown: Duration,
    last_swipe: Option<Instant>,
}

impl SwipeDetector {
    pub fn new(capacity: usize, threshold: f32, cooldown: Duration) -> Self {
        let capacity = capacity.max(2);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            threshold,
            cooldown,
            last_swipe: None,
        }
    }

    /// Añade la x de referencia de un frame con mano y evalúa el swipe
    pub fn update(&mut self, x: f32, now: Instant) -> Option<SwipeDirection> {
        self.history.push_back(x);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }

        if self.history.len() < self.capacity {
            return None;
        }

        if let Some(last) = self.last_swipe {
            if now.saturating_duration_since(last) <= self.cooldown {
                return None;
            }
        }

        let oldest = *self.history.front()?;
        let newest = *self.history.back()?;
        let delta = newest - oldest;

        let direction = if delta < -self.threshold {
            SwipeDirection::Left
        } else if delta > self.threshold {
            SwipeDirection::Right
        } else {
            return None;
        };

        self.last_swipe = Some(now);
        self.history.clear();
        Some(direction)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> SwipeDetector {
        SwipeDetector::new(10, 0.3, Duration::from_secs(1))
    }

    fn feed(det: &mut SwipeDetector, xs: &[f32], t: Instant) -> Vec<SwipeDirection> {
        xs.iter()
            .enumerate()
            .filter_map(|(i, &x)| det.update(x, t + Duration::from_millis(i as u64)))
            .collect()
    }

    #[test]
    fn test_left_swipe_triggers_once() {
        let mut det = detector();
        let mut xs = vec![0.8; 9];
        xs.push(0.4);
        let hits = feed(&mut det, &xs, Instant::now());
        assert_eq!(hits, vec![SwipeDirection::Left]);
        assert_eq!(det.history_len(), 0);
    }

    #[test]
    fn test_right_swipe() {
        let mut det = detector();
        let xs: Vec<f32> = (0..10).map(|i| 0.2 + i as f32 * 0.05).collect();
        assert_eq!(feed(&mut det, &xs, Instant::now()), vec![SwipeDirection::Right]);
    }

    #[test]
    fn test_small_motion_is_ignored() {
        let mut det = detector();
        let mut xs = vec![0.8; 9];
        xs.push(0.6);
        assert!(feed(&mut det, &xs, Instant::now()).is_empty());
    }

    #[test]
    fn test_needs_full_history() {
        let mut det = detector();
        assert!(feed(&mut det, &[0.9, 0.1], Instant::now()).is_empty());
    }

    #[test]
    fn test_cooldown_blocks_second_swipe() {
        let mut det = detector();
        let mut xs = vec![0.8; 9];
        xs.push(0.4);
        let t0 = Instant::now();
        assert_eq!(feed(&mut det, &xs, t0).len(), 1);
        assert!(feed(&mut det, &xs, t0 + Duration::from_millis(500)).is_empty());
        assert_eq!(feed(&mut det, &xs, t0 + Duration::from_millis(1500)).len(), 1);
    }
}
