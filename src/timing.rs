/// Humanised timing — randomised delays around every dispatched action.
///
/// Pre and post delays are independent normal draws centred on
/// `base_delay_ms` with σ = `random_variance_ms / 3`, floored at
/// `MIN_DELAY_MS` (never 0). With `micro_pause_chance_percent` probability an
/// extra uniform pause in `micro_pause_min_ms..=micro_pause_max_ms` is added.
///
/// The generator never sees which action was chosen; the random source is
/// passed in so tests can seed it.
use crate::config::BehaviorProfile;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

pub const MIN_DELAY_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingPlan {
    pub pre_delay_ms:   u64,
    pub post_delay_ms:  u64,
    /// Extra hesitation appended after `post_delay_ms`, when triggered.
    pub micro_pause_ms: Option<u64>,
}

impl TimingPlan {
    pub fn micro_pause_triggered(&self) -> bool {
        self.micro_pause_ms.is_some()
    }

    /// Everything waited after the dispatch.
    pub fn after_dispatch_ms(&self) -> u64 {
        self.post_delay_ms + self.micro_pause_ms.unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct HumanTiming {
    profile: BehaviorProfile,
}

impl HumanTiming {
    /// Expects a profile that passed `RotationConfig::validate`. An inverted
    /// micro-pause range collapses to `micro_pause_min_ms` instead of panicking.
    pub fn new(profile: BehaviorProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &BehaviorProfile {
        &self.profile
    }

    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> TimingPlan {
        let pre_delay_ms  = self.delay(rng);
        let post_delay_ms = self.delay(rng);

        let chance = self.profile.micro_pause_chance_percent / 100.0;
        let chance = if chance.is_finite() { chance.clamp(0.0, 1.0) } else { 0.0 };
        let min = self.profile.micro_pause_min_ms;
        let max = self.profile.micro_pause_max_ms.max(min);
        let micro_pause_ms = rng.gen_bool(chance).then(|| rng.gen_range(min..=max));

        TimingPlan { pre_delay_ms, post_delay_ms, micro_pause_ms }
    }

    /// One normal draw, floored.
    pub fn delay<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let sigma = self.profile.random_variance_ms as f64 / 3.0;
        let z: f64 = rng.sample(StandardNormal);
        let drawn = self.profile.base_delay_ms as f64 + z * sigma;
        (drawn.round().max(MIN_DELAY_MS as f64)) as u64
    }
}
