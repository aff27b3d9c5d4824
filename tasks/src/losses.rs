use crate::{Result, TaskErr};

/// Cross entropy between the softmax of every row of `logits` and the matching row
/// of `labels`.
///
/// # Arguments
/// * `logits` - Row major unnormalized log probabilities, `num_classes` per row.
/// * `labels` - Target distributions with the same layout, usually one hot.
/// * `num_classes` - The length of every row.
///
/// # Returns
/// One loss per row, or an error if the buffers don't split into rows of
/// `num_classes` or their lengths differ.
pub fn softmax_cross_entropy(
    logits: &[f32],
    labels: &[f32],
    num_classes: usize,
) -> Result<Vec<f32>> {
    if num_classes == 0 || logits.len() % num_classes != 0 {
        return Err(TaskErr::InvalidConfig(
            "logits must split into rows of num_classes",
        ));
    }

    if labels.len() != logits.len() {
        return Err(TaskErr::InvalidBatch {
            got: labels.len(),
            expected: logits.len(),
        });
    }

    let losses = logits
        .chunks_exact(num_classes)
        .zip(labels.chunks_exact(num_classes))
        .map(|(row, targets)| {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_norm = max + row.iter().map(|l| (l - max).exp()).sum::<f32>().ln();

            let log_likelihood: f32 = row
                .iter()
                .zip(targets)
                .map(|(l, t)| t * (l - log_norm))
                .sum();

            -log_likelihood
        })
        .collect();

    Ok(losses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_logits_cost_log_num_classes() {
        let labels = [1., 0., 0., 0., 0., 0., 1., 0.];
        let losses = softmax_cross_entropy(&[0.; 8], &labels, 4).unwrap();

        assert_eq!(losses.len(), 2);
        for loss in losses {
            assert!((loss - 4f32.ln()).abs() < 1e-6);
        }
    }

    #[test]
    fn large_logits_stay_finite() {
        let losses = softmax_cross_entropy(&[1000., 0.], &[1., 0.], 2).unwrap();
        assert!(losses[0].abs() < 1e-6);

        let losses = softmax_cross_entropy(&[1000., 0.], &[0., 1.], 2).unwrap();
        assert!((losses[0] - 1000.).abs() < 1e-3);
    }

    #[test]
    fn soft_labels_weigh_every_class() {
        let logits = [2f32.ln(), 0.];
        let losses = softmax_cross_entropy(&logits, &[0.5, 0.5], 2).unwrap();

        // p = [2/3, 1/3]
        let expected = -0.5 * (2f32 / 3.).ln() - 0.5 * (1f32 / 3.).ln();
        assert!((losses[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn rejects_misshapen_buffers() {
        assert!(softmax_cross_entropy(&[0.; 3], &[0.; 3], 2).is_err());
        assert!(softmax_cross_entropy(&[0.; 2], &[0.; 2], 0).is_err());
        assert_eq!(
            softmax_cross_entropy(&[0.; 4], &[0.; 2], 2).unwrap_err(),
            TaskErr::InvalidBatch {
                got: 2,
                expected: 4
            }
        );
    }
}
