use chrono::Duration;
use cohort_config::TieConfig;
use cohort_core::Timestamp;

use crate::GraphError;

/// Tie reinforcement and decay. Weights live in `(0, 1]`: every interaction
/// adds `jump_size` (capped at 1), and between interactions the weight
/// follows a Gaussian-shaped decay that is flat for `offset` time steps
/// after the last event. `scale` is the half-life expressed in time steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TieStrengthModel {
    time_step_minutes: f64,
    jump_size: f64,
    threshold: f64,
    offset_steps: f64,
    decay: f64,
    scale: f64,
}

impl TieStrengthModel {
    pub fn from_config(config: &TieConfig) -> Result<Self, GraphError> {
        if config.time_step_minutes <= 0.0 {
            return Err(GraphError::NonPositiveTimeStep(config.time_step_minutes));
        }

        let offset_steps = config.offset_minutes / config.time_step_minutes;
        let period_steps = config.period_of_total_decay_minutes / config.time_step_minutes;
        if offset_steps >= period_steps {
            return Err(GraphError::OffsetBeyondDecayPeriod {
                offset_steps,
                period_steps,
            });
        }

        let scale = match config.scale {
            Some(scale) => scale,
            None => derive_half_life(config.decay, config.threshold, offset_steps, period_steps)?,
        };

        Ok(Self {
            time_step_minutes: config.time_step_minutes,
            jump_size: config.jump_size,
            threshold: config.threshold,
            offset_steps,
            decay: config.decay,
            scale,
        })
    }

    /// Weight below which an edge disappears.
    pub fn cutoff_threshold(&self) -> f64 {
        self.threshold
    }

    /// Increase the tie strength by the jump size, capped at 1.
    pub fn reinforce(&self, current_weight: f64) -> f64 {
        (current_weight + self.jump_size).min(1.0)
    }

    /// Fractional number of time steps between two instants. The difference
    /// is deliberately not rounded: the decay curve is continuous and a
    /// fraction of a step decays a fraction of the way.
    pub fn steps_between(&self, from: Timestamp, to: Timestamp) -> f64 {
        let minutes = (to - from).num_milliseconds() as f64 / 60_000.0;
        minutes / self.time_step_minutes
    }

    /// Decay `weight_at_last_event` over `steps` time steps, counted from
    /// the last interaction on the edge. Flat while `steps` stays within the
    /// stability offset.
    pub fn decay_weight(&self, weight_at_last_event: f64, steps: f64) -> f64 {
        let effective = (steps - self.offset_steps).max(0.0).powi(2);
        let denominator = self.scale.powi(2) / self.decay.ln();
        let decayed = weight_at_last_event * (effective / denominator).exp();
        decayed.min(1.0)
    }

    /// The instant at which `weight` decays past the cutoff threshold,
    /// assuming the last interaction on the edge happened at
    /// `last_event`. One extra minute is added so a snapshot scheduled at
    /// the returned instant lands strictly after the crossing.
    pub fn predicted_expiry(&self, weight: f64, last_event: Timestamp) -> Timestamp {
        let stable_until = last_event + duration_minutes(self.offset_steps * self.time_step_minutes);
        let steps_to_cutoff = ((self.threshold.ln() - weight.ln()) * self.scale.powi(2)
            / self.decay.ln())
        .max(0.0)
        .sqrt();

        stable_until
            + duration_minutes(steps_to_cutoff * self.time_step_minutes)
            + Duration::minutes(1)
    }
}

/// Half-life such that a full-strength tie reaches the cutoff threshold
/// exactly at the end of the decay period. Solving the decay curve for the
/// scale only works when the decay value is the half-life fraction 0.5.
fn derive_half_life(
    decay: f64,
    threshold: f64,
    offset_steps: f64,
    period_steps: f64,
) -> Result<f64, GraphError> {
    if decay != 0.5 {
        return Err(GraphError::UndefinedHalfLife(decay));
    }

    let nominator = (period_steps - offset_steps).powi(2) * decay.ln();
    Ok((nominator / threshold.ln()).sqrt())
}

pub(crate) fn duration_minutes(minutes: f64) -> Duration {
    Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_config::TieConfig;

    use super::*;

    fn model(config: &TieConfig) -> TieStrengthModel {
        TieStrengthModel::from_config(config).expect("valid tie config")
    }

    fn default_model() -> TieStrengthModel {
        model(&TieConfig::default())
    }

    fn t0() -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn reinforcement_is_bounded_and_monotone() {
        let model = default_model();
        assert_eq!(model.reinforce(0.0), 0.3);
        assert_eq!(model.reinforce(0.9), 1.0);
        for weight in [0.0, 0.2, 0.5, 0.95, 1.0] {
            let reinforced = model.reinforce(weight);
            assert!(reinforced >= weight);
            assert!(reinforced <= 1.0);
        }
    }

    #[test]
    fn decay_is_monotone_beyond_the_offset() {
        let config = TieConfig {
            offset_minutes: 1440.0,
            ..TieConfig::default()
        };
        let model = model(&config);
        let offset_steps = 1440.0 / config.time_step_minutes;

        // flat within the stability window
        assert_eq!(model.decay_weight(0.8, 0.0), 0.8);
        assert_eq!(model.decay_weight(0.8, offset_steps), 0.8);

        let mut previous = 0.8;
        for steps in [3.0, 5.0, 10.0, 20.0, 34.0] {
            let decayed = model.decay_weight(0.8, steps);
            assert!(decayed <= previous, "decay must not increase over time");
            previous = decayed;
        }
        assert!(previous < 0.01);
    }

    #[test]
    fn full_strength_tie_reaches_threshold_at_period_end() {
        let model = default_model();
        let period_steps = 17.0 * 24.0 * 60.0 / 720.0;
        let decayed = model.decay_weight(1.0, period_steps);
        assert!((decayed - 0.01).abs() < 1e-9);
    }

    #[test]
    fn predicted_expiry_round_trips_through_the_decay_curve() {
        let model = default_model();
        let weight = 0.3;
        let expiry = model.predicted_expiry(weight, t0());
        assert!(expiry > t0());

        let decayed = model.decay_weight(weight, model.steps_between(t0(), expiry));
        assert!(decayed < weight);
        assert!(decayed < model.cutoff_threshold());
        assert!((decayed - model.cutoff_threshold()).abs() < 1e-3);
    }

    #[test]
    fn expiry_shifts_with_the_stability_offset() {
        let plain = model(&TieConfig {
            scale: Some(13.0),
            ..TieConfig::default()
        });
        let offset = model(&TieConfig {
            scale: Some(13.0),
            offset_minutes: 1440.0,
            ..TieConfig::default()
        });

        let difference = offset.predicted_expiry(0.3, t0()) - plain.predicted_expiry(0.3, t0());
        assert_eq!(difference.num_minutes(), 1440);
    }

    #[test]
    fn fractional_steps_are_not_rounded() {
        let model = default_model();
        let later = t0() + Duration::minutes(1080);
        assert!((model.steps_between(t0(), later) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn non_half_decay_without_scale_is_rejected() {
        let config = TieConfig {
            decay: 0.4,
            ..TieConfig::default()
        };
        assert!(matches!(
            TieStrengthModel::from_config(&config),
            Err(GraphError::UndefinedHalfLife(_))
        ));

        let with_scale = TieConfig {
            decay: 0.4,
            scale: Some(20.0),
            ..TieConfig::default()
        };
        assert!(TieStrengthModel::from_config(&with_scale).is_ok());
    }

    #[test]
    fn offset_past_the_decay_period_is_rejected() {
        let config = TieConfig {
            offset_minutes: 18.0 * 24.0 * 60.0,
            ..TieConfig::default()
        };
        assert!(matches!(
            TieStrengthModel::from_config(&config),
            Err(GraphError::OffsetBeyondDecayPeriod { .. })
        ));
    }
}
