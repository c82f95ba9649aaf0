use percex_core::{GenerationError, MARKED, TrialData, TrialGenerator};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::{ExperimentConfig, ValueRange};

/// Source of uniformly distributed integers in a closed range
pub trait ValueSource {
    fn draw(&mut self, lower: u32, upper: u32) -> u32;
}

/// Adapts any `rand::Rng` into a value source
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> ValueSource for RngSource<R> {
    fn draw(&mut self, lower: u32, upper: u32) -> u32 {
        self.0.random_range(lower..=upper)
    }
}

/// Rejection-sampling trial generator
#[derive(Debug, Clone)]
pub struct RandomTrialGenerator<S: ValueSource> {
    source: S,
    range: ValueRange,
    min_marked_gap: Option<u32>,
    max_draws: usize,
}

impl<R: Rng> RandomTrialGenerator<RngSource<R>> {
    pub fn from_rng(rng: R) -> Self {
        Self::with_source(RngSource(rng))
    }
}

impl<S: ValueSource> RandomTrialGenerator<S> {
    pub fn with_source(source: S) -> Self {
        let defaults = ExperimentConfig::default();
        Self {
            source,
            range: defaults.value_range,
            min_marked_gap: defaults.min_marked_gap,
            max_draws: defaults.max_draws,
        }
    }

    pub fn from_config(source: S, config: &ExperimentConfig) -> Self {
        Self {
            source,
            range: config.value_range,
            min_marked_gap: config.min_marked_gap,
            max_draws: config.max_draws,
        }
    }

    pub fn range(mut self, range: ValueRange) -> Self {
        self.range = range;
        self
    }

    pub fn min_marked_gap(mut self, gap: Option<u32>) -> Self {
        self.min_marked_gap = gap;
        self
    }

    pub fn max_draws(mut self, max_draws: usize) -> Self {
        self.max_draws = max_draws;
        self
    }

    /// Draws `n` distinct values and marks positions 1 and 2.
    pub fn generate_trial_data(&mut self, n: usize) -> Result<TrialData, GenerationError> {
        self.check(n)?;
        let ValueRange { lower, upper } = self.range;

        let mut values: Vec<u32> = Vec::with_capacity(n);
        let mut draws = 0;
        while values.len() < n {
            if draws >= self.max_draws {
                warn!(draws, n, "distinct value sampling exhausted");
                return Err(GenerationError::Exhausted { draws });
            }
            let v = self.source.draw(lower, upper);
            draws += 1;
            if !values.contains(&v) {
                values.push(v);
            }
        }

        if let Some(gap) = self.min_marked_gap {
            let anchor = values[MARKED[0]];
            if anchor - lower < gap && upper - anchor < gap {
                return Err(GenerationError::UnsatisfiableGap { anchor, gap });
            }
            while values[MARKED[0]].abs_diff(values[MARKED[1]]) < gap {
                if draws >= self.max_draws {
                    warn!(draws, gap, "marked gap re-roll exhausted");
                    return Err(GenerationError::Exhausted { draws });
                }
                let candidate = self.source.draw(lower, upper);
                draws += 1;
                if !values.contains(&candidate) {
                    values[MARKED[1]] = candidate;
                }
            }
        }

        debug!(?values, draws, "generated trial values");
        TrialData::from_values(values)
    }

    /// Draws `count` trials, no two of which share their first two values.
    pub fn generate_set(&mut self, count: usize, n: usize) -> Result<Vec<TrialData>, GenerationError> {
        self.check(n)?;
        let budget = self.max_draws.saturating_mul(count.max(1));
        let mut trials: Vec<TrialData> = Vec::with_capacity(count);
        let mut attempts = 0;
        while trials.len() < count {
            if attempts >= budget {
                warn!(attempts, count, "trial set generation exhausted");
                return Err(GenerationError::Exhausted { draws: attempts });
            }
            attempts += 1;
            let trial = self.generate_trial_data(n)?;
            let duplicate = trials
                .iter()
                .any(|t| t.values()[..2] == trial.values()[..2]);
            if !duplicate {
                trials.push(trial);
            }
        }
        Ok(trials)
    }

    fn check(&self, n: usize) -> Result<(), GenerationError> {
        if n <= MARKED[1] {
            return Err(GenerationError::InvalidPointCount(n));
        }
        let ValueRange { lower, upper } = self.range;
        if lower >= upper {
            return Err(GenerationError::EmptyRange { lower, upper });
        }
        if n > self.range.len() {
            return Err(GenerationError::RangeTooSmall {
                requested: n,
                available: self.range.len(),
            });
        }
        Ok(())
    }
}

impl<S: ValueSource> TrialGenerator for RandomTrialGenerator<S> {
    fn generate(&mut self, points: usize) -> Result<TrialData, GenerationError> {
        self.generate_trial_data(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<u32>);

    impl Scripted {
        fn new(values: &[u32]) -> Self {
            Self(values.iter().copied().collect())
        }
    }

    impl ValueSource for Scripted {
        fn draw(&mut self, lower: u32, upper: u32) -> u32 {
            let v = self.0.pop_front().expect("script exhausted");
            assert!((lower..=upper).contains(&v));
            v
        }
    }

    struct Constant(u32);

    impl ValueSource for Constant {
        fn draw(&mut self, _lower: u32, _upper: u32) -> u32 {
            self.0
        }
    }

    #[test]
    fn scripted_draws_give_expected_percentage() {
        let mut generator = RandomTrialGenerator::with_source(Scripted::new(&[10, 50, 60, 5, 80]))
            .range(ValueRange { lower: 2, upper: 99 });
        let trial = generator.generate_trial_data(5).unwrap();
        assert_eq!(trial.values(), &[10, 50, 60, 5, 80]);
        assert_eq!(trial.marked(), [1, 2]);
        assert_eq!(trial.true_percentage(), 83);
    }

    #[test]
    fn repeated_draws_are_rejected() {
        let mut generator =
            RandomTrialGenerator::with_source(Scripted::new(&[10, 10, 50, 50, 60, 5, 80]));
        let trial = generator.generate_trial_data(5).unwrap();
        assert_eq!(trial.values(), &[10, 50, 60, 5, 80]);
    }

    #[test]
    fn marked_gap_rerolls_third_value() {
        let mut generator =
            RandomTrialGenerator::with_source(Scripted::new(&[10, 50, 52, 5, 80, 80, 53, 70]))
                .min_marked_gap(Some(5));
        let trial = generator.generate_trial_data(5).unwrap();
        assert_eq!(trial.values(), &[10, 50, 70, 5, 80]);
        assert_eq!(trial.true_percentage(), 71);
    }

    #[test]
    fn sampling_stops_at_draw_limit() {
        let mut generator = RandomTrialGenerator::with_source(Constant(7)).max_draws(10);
        assert_eq!(
            generator.generate_trial_data(5),
            Err(GenerationError::Exhausted { draws: 10 })
        );
    }

    #[test]
    fn impossible_requests_fail_up_front() {
        let mut generator = RandomTrialGenerator::with_source(Constant(7));
        assert_eq!(
            generator.generate_trial_data(2),
            Err(GenerationError::InvalidPointCount(2))
        );

        let mut generator = RandomTrialGenerator::with_source(Constant(7))
            .range(ValueRange { lower: 2, upper: 5 });
        assert_eq!(
            generator.generate_trial_data(5),
            Err(GenerationError::RangeTooSmall {
                requested: 5,
                available: 4
            })
        );

        let mut generator = RandomTrialGenerator::with_source(Scripted::new(&[2, 4, 3]))
            .range(ValueRange { lower: 2, upper: 6 })
            .min_marked_gap(Some(3));
        assert_eq!(
            generator.generate_trial_data(3),
            Err(GenerationError::UnsatisfiableGap { anchor: 4, gap: 3 })
        );
    }

    #[test]
    fn trial_set_has_unique_leading_pairs() {
        let mut generator = RandomTrialGenerator::with_source(Scripted::new(&[
            10, 50, 60, // first
            10, 50, 70, // same leading pair, skipped
            11, 50, 60, // kept
        ]));
        let trials = generator.generate_set(2, 3).unwrap();
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].values(), &[10, 50, 60]);
        assert_eq!(trials[1].values(), &[11, 50, 60]);
    }

    proptest! {
        #[test]
        fn generated_trials_hold_their_invariants(seed in any::<u64>()) {
            let mut generator = RandomTrialGenerator::from_rng(StdRng::seed_from_u64(seed));
            let trial = generator.generate_trial_data(5).unwrap();
            let values = trial.values();
            prop_assert_eq!(values.len(), 5);
            for (i, v) in values.iter().enumerate() {
                prop_assert!((2..=99).contains(v));
                prop_assert!(!values[..i].contains(v));
            }
            prop_assert_eq!(trial.marked(), [1, 2]);
            let (a, b) = trial.marked_values();
            let expected = (100.0 * a.min(b) as f64 / a.max(b) as f64).round() as u32;
            prop_assert_eq!(trial.true_percentage(), expected);
            prop_assert!((1..=100).contains(&trial.true_percentage()));
        }

        #[test]
        fn marked_gap_is_respected(seed in any::<u64>(), gap in 1u32..40) {
            let mut generator = RandomTrialGenerator::from_rng(StdRng::seed_from_u64(seed))
                .min_marked_gap(Some(gap));
            let trial = generator.generate_trial_data(5).unwrap();
            let (a, b) = trial.marked_values();
            prop_assert!(a.abs_diff(b) >= gap);
        }
    }
}
