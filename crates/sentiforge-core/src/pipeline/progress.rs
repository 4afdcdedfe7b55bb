use std::fmt;

/// Coarse checkpoints of a pipeline run, reported in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    /// Labels were binary-encoded.
    LabelsEncoded,
    /// Rows were split into train and test.
    Split,
    /// The vocabulary was counted from the train split.
    VocabularyBuilt,
    /// The lookup table was built.
    TableBuilt,
    /// Train and test encoders are ready.
    Encoded,
}

impl Milestone {
    /// All milestones in the order they are reported.
    pub fn all() -> &'static [Milestone] {
        &[
            Milestone::LabelsEncoded,
            Milestone::Split,
            Milestone::VocabularyBuilt,
            Milestone::TableBuilt,
            Milestone::Encoded,
        ]
    }

    /// Completion percentage after this milestone.
    pub fn percent(&self) -> u8 {
        match self {
            Milestone::LabelsEncoded => 20,
            Milestone::Split => 40,
            Milestone::VocabularyBuilt => 60,
            Milestone::TableBuilt => 80,
            Milestone::Encoded => 100,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::LabelsEncoded => write!(f, "labels encoded"),
            Milestone::Split => write!(f, "dataset split"),
            Milestone::VocabularyBuilt => write!(f, "vocabulary built"),
            Milestone::TableBuilt => write!(f, "lookup table built"),
            Milestone::Encoded => write!(f, "datasets encoded"),
        }
    }
}

/// Receives pipeline milestones. Implemented for every `FnMut(Milestone)`.
pub trait Progress {
    fn report(&mut self, milestone: Milestone);
}

impl<F: FnMut(Milestone)> Progress for F {
    fn report(&mut self, milestone: Milestone) {
        self(milestone)
    }
}

/// Progress sink that ignores every milestone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _milestone: Milestone) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_increasing() {
        let percents: Vec<u8> = Milestone::all().iter().map(Milestone::percent).collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.last(), Some(&100));
    }

    #[test]
    fn test_closure_is_progress() {
        let mut seen = Vec::new();
        {
            let mut sink = |m: Milestone| seen.push(m);
            sink.report(Milestone::Split);
        }
        assert_eq!(seen, vec![Milestone::Split]);
    }
}
