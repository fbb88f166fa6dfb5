/// Decides whether the user is away from the keyboard based on the time since their last input.
pub struct AfkEvaluator {
    threshold_ms: u64,
}

impl AfkEvaluator {
    pub fn from_seconds(threshold_s: u32) -> Self {
        Self {
            threshold_ms: u64::from(threshold_s) * 1000,
        }
    }

    pub fn is_afk(&self, idle_time_ms: u32) -> bool {
        self.threshold_ms < u64::from(idle_time_ms)
    }
}
