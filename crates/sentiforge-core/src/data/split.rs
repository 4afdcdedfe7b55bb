//! Order-preserving train/test splitter.

use crate::error::{Result, SentiError};
use crate::types::Dataset;

/// Boundary index between the train and test partitions.
///
/// `round(len * ratio)` with ties rounded to even, clamped to `len`.
pub fn split_index(len: usize, ratio: f64) -> usize {
    let boundary = (len as f64 * ratio).round_ties_even();
    (boundary.max(0.0) as usize).min(len)
}

/// Split `dataset` into `(train, test)` without shuffling.
///
/// `ratio` is the fraction assigned to train. `0.0` and `1.0` are accepted
/// and produce an empty train or test partition respectively.
pub fn split(dataset: Dataset, ratio: f64) -> Result<(Dataset, Dataset)> {
    if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
        return Err(SentiError::InvalidConfig(format!(
            "split ratio must be within [0, 1], got {ratio}"
        )));
    }

    let boundary = split_index(dataset.len(), ratio);
    let mut train = dataset.records().to_vec();
    let test = train.split_off(boundary);

    tracing::debug!(
        train = train.len(),
        test = test.len(),
        ratio,
        "split dataset"
    );

    Ok((Dataset::new(train), Dataset::new(test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    fn dataset(n: usize) -> Dataset {
        (0..n)
            .map(|i| Record::new(format!("row {i}"), (i % 2) as u8))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_ten_rows_half() {
        let (train, test) = split(dataset(10), 0.5).unwrap();
        assert_eq!(train.len(), 5);
        assert_eq!(test.len(), 5);
        assert_eq!(train.records()[0].text, "row 0");
        assert_eq!(test.records()[0].text, "row 5");
    }

    #[test]
    fn test_partition_is_exact_and_ordered() {
        for n in [0, 1, 2, 3, 7, 10, 33, 100] {
            for ratio in [0.1, 0.25, 0.3, 0.5, 0.7, 0.9] {
                let original = dataset(n);
                let (train, test) = split(original.clone(), ratio).unwrap();
                assert_eq!(train.len() + test.len(), n);

                let joined: Vec<Record> = train.iter().chain(test.iter()).cloned().collect();
                assert_eq!(joined, original.records());
            }
        }
    }

    #[test]
    fn test_ties_round_to_even() {
        assert_eq!(split_index(5, 0.5), 2);
        assert_eq!(split_index(3, 0.5), 2);
        assert_eq!(split_index(7, 0.5), 4);
    }

    #[test]
    fn test_extreme_ratios() {
        let (train, test) = split(dataset(4), 0.0).unwrap();
        assert!(train.is_empty());
        assert_eq!(test.len(), 4);

        let (train, test) = split(dataset(4), 1.0).unwrap();
        assert_eq!(train.len(), 4);
        assert!(test.is_empty());
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(split(dataset(4), 1.5).is_err());
        assert!(split(dataset(4), f64::NAN).is_err());
    }
}
