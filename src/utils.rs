use crate::errors::TrepanError;
use std::collections::BTreeMap;

/// Count occurrences of each class label.
pub fn label_counts<'a, I>(labels: I) -> BTreeMap<usize, usize>
where
    I: IntoIterator<Item = &'a usize>,
{
    let mut counts = BTreeMap::new();
    for l in labels {
        *counts.entry(*l).or_insert(0) += 1;
    }
    counts
}

/// Merge two label count tables.
pub fn merge_counts(a: &BTreeMap<usize, usize>, b: &BTreeMap<usize, usize>) -> BTreeMap<usize, usize> {
    let mut out = a.clone();
    for (k, v) in b {
        *out.entry(*k).or_insert(0) += v;
    }
    out
}

/// Most frequent label, ties go to the smallest label.
pub fn mode(counts: &BTreeMap<usize, usize>) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (label, count) in counts {
        match best {
            Some((_, c)) if c >= *count => {}
            _ => best = Some((*label, *count)),
        }
    }
    best.map(|(label, _)| label)
}

/// Shannon entropy (bits) of a label distribution given by its counts.
pub fn entropy_of_counts<I>(counts: I) -> f64
where
    I: IntoIterator<Item = usize>,
{
    let counts: Vec<usize> = counts.into_iter().filter(|c| *c > 0).collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .map(|c| {
            let p = *c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Shannon entropy (bits) of a slice of labels.
pub fn entropy(labels: &[usize]) -> f64 {
    entropy_of_counts(label_counts(labels).into_values())
}

/// Index of the largest value, the first one wins ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Fraction of positions where the two label vectors agree.
pub fn agreement(a: &[usize], b: &[usize]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let same = a.iter().zip(b).filter(|(x, y)| x == y).count();
    same as f64 / a.len() as f64
}

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), TrepanError> {
    if value.is_nan() || value <= min || max < value {
        let ex_msg = format!("real value within range ({}, {}]", min, max);
        Err(TrepanError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_positive_count(value: usize, parameter: &str) -> Result<(), TrepanError> {
    if value == 0 {
        Err(TrepanError::InvalidParameter(
            parameter.to_string(),
            "a positive integer".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}
