use rand::seq::SliceRandom;
use rand::Rng;

/// Bounds applied to feed requests.
#[derive(Debug, Clone, Copy)]
pub struct FeedLimits {
    pub default_limit: u16,
    pub max_limit: u16,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

impl FeedLimits {
    /// Resolve a requested page size. A missing or zero request falls
    /// back to the default; anything above the cap is silently clamped.
    pub fn clamp(&self, requested: Option<u16>) -> u16 {
        match requested {
            None | Some(0) => self.default_limit,
            Some(n) => n.min(self.max_limit),
        }
    }
}

/// Shuffle feed candidates in place.
///
/// The feed carries no ordering contract: every call re-randomizes, so
/// two identical requests may return the same pets in different order.
pub fn randomize<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}
