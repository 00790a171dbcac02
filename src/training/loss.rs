//! Masked negative log-likelihood.
//!
//! Only rows selected by the train mask contribute; the loss is their mean.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

fn masked_rows(mask: &Array1<bool>) -> Result<usize> {
    let count = mask.iter().filter(|&&m| m).count();
    if count == 0 {
        return Err(Error::EmptySupervision);
    }
    Ok(count)
}

/// Mean of `-log_probs[i, labels[i]]` over masked rows.
pub fn masked_nll_loss(
    log_probs: &Array2<f64>,
    labels: &Array1<usize>,
    mask: &Array1<bool>,
) -> Result<f64> {
    let count = masked_rows(mask)?;
    let mut total = 0.0;
    for (i, (&m, &y)) in mask.iter().zip(labels).enumerate() {
        if m {
            total -= log_probs[[i, y]];
        }
    }
    Ok(total / count as f64)
}

/// Gradient of [`masked_nll_loss`] w.r.t. the log-probabilities.
pub fn masked_nll_gradient(
    log_probs: &Array2<f64>,
    labels: &Array1<usize>,
    mask: &Array1<bool>,
) -> Result<Array2<f64>> {
    let count = masked_rows(mask)?;
    let mut grad = Array2::zeros(log_probs.dim());
    for (i, (&m, &y)) in mask.iter().zip(labels).enumerate() {
        if m {
            grad[[i, y]] = -1.0 / count as f64;
        }
    }
    Ok(grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_only_masked_rows_count() {
        let log_probs = array![
            [0.25f64.ln(), 0.75f64.ln()],
            [0.5f64.ln(), 0.5f64.ln()],
            [1e-9f64.ln(), 0.0]
        ];
        let labels = array![1, 0, 0];
        let mask = array![true, true, false];

        let loss = masked_nll_loss(&log_probs, &labels, &mask).unwrap();
        assert_relative_eq!(loss, -(0.75f64.ln() + 0.5f64.ln()) / 2.0, epsilon = 1e-12);

        let grad = masked_nll_gradient(&log_probs, &labels, &mask).unwrap();
        assert_eq!(grad, array![[0.0, -0.5], [-0.5, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_empty_mask_fails() {
        let log_probs = Array2::zeros((2, 2));
        let labels = array![0, 1];
        let mask = array![false, false];

        assert!(matches!(
            masked_nll_loss(&log_probs, &labels, &mask),
            Err(Error::EmptySupervision)
        ));
        assert!(matches!(
            masked_nll_gradient(&log_probs, &labels, &mask),
            Err(Error::EmptySupervision)
        ));
    }
}
