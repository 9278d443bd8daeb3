use crate::error::{ReportError, Result};

/// Returns the minimum of `values` together with every index holding it.
///
/// Ties are detected with exact floating-point equality. Indices come back in
/// ascending order. NaN has no place in that order and is rejected, so a
/// successful result always holds at least one index.
pub fn locate_min(values: &[f64]) -> Result<(f64, Vec<usize>)> {
    let Some(&first) = values.first() else {
        return Err(ReportError::InvalidInput(
            "cannot locate the minimum of an empty sequence".to_string(),
        ));
    };
    if let Some(position) = values.iter().position(|value| value.is_nan()) {
        return Err(ReportError::InvalidInput(format!(
            "cannot locate the minimum: value at index {position} is NaN"
        )));
    }

    let min_value = values.iter().copied().fold(first, f64::min);
    let indices = values
        .iter()
        .enumerate()
        .filter(|(_, value)| **value == min_value)
        .map(|(index, _)| index)
        .collect();

    Ok((min_value, indices))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}
