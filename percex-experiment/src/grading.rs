use percex_core::{Grade, Grader, TrialData};

/// Cleveland & McGill's error: log2(|error| + 1/8), with exact answers scoring 0.
pub fn score(trial: &TrialData, response: f64) -> Grade {
    let raw_error = (trial.true_percentage() as f64 - response).abs();
    Grade {
        raw_error,
        log2_error: cm_error(raw_error),
    }
}

pub fn cm_error(raw_error: f64) -> f64 {
    if raw_error == 0.0 {
        0.0
    } else {
        (raw_error + 0.125).log2()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CmErrorGrader;

impl Grader for CmErrorGrader {
    fn score(&self, trial: &TrialData, response: f64) -> Grade {
        score(trial, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn trial_83() -> TrialData {
        TrialData::from_values(vec![10, 50, 60, 5, 80]).unwrap()
    }

    #[test]
    fn exact_answer_scores_zero() {
        let grade = score(&trial_83(), 83.0);
        assert_eq!(grade.raw_error, 0.0);
        assert_eq!(grade.log2_error, 0.0);
    }

    #[test]
    fn miss_by_thirteen() {
        let grade = CmErrorGrader.score(&trial_83(), 70.0);
        assert_eq!(grade.raw_error, 13.0);
        assert!((grade.log2_error - 3.714).abs() < 1e-3);
        assert_eq!(grade.log2_error, 13.125f64.log2());
    }

    #[test]
    fn error_is_symmetric_around_truth() {
        let over = score(&trial_83(), 90.5);
        let under = score(&trial_83(), 75.5);
        assert_eq!(over, under);
        assert_eq!(over.raw_error, 7.5);
    }

    proptest! {
        #[test]
        fn grade_follows_the_formula(response in 0.0f64..=100.0) {
            let trial = trial_83();
            let grade = score(&trial, response);
            prop_assert_eq!(grade.raw_error, (83.0 - response).abs());
            if grade.raw_error == 0.0 {
                prop_assert_eq!(grade.log2_error, 0.0);
            } else {
                prop_assert_eq!(grade.log2_error, (grade.raw_error + 0.125).log2());
            }
        }
    }
}
