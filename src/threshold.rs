//! Per-slice intensity cutoff.

use ndarray::ArrayView2;

/// How many standard deviations above the median a sample must be to count as foreground.
pub const STD_FACTOR: f64 = 3.0;

/// Finds the threshold of a single slice: `median + 3 * std` over every sample.
///
/// The median of an even number of samples is the mean of the two middle ones and
/// the standard deviation is the population one. A constant slice gives back the
/// constant, an empty slice gives 0.
pub fn find_threshold(slice: &ArrayView2<u16>) -> f64 {
    let mut samples: Vec<u16> = slice.iter().copied().collect();
    if samples.is_empty() {
        return 0.0;
    }
    median(&mut samples) + STD_FACTOR * std_dev(slice)
}

fn median(samples: &mut [u16]) -> f64 {
    let n = samples.len();
    let mid = n / 2;
    let (lower, upper, _) = samples.select_nth_unstable(mid);
    let upper = *upper as f64;
    if n % 2 == 1 {
        upper
    } else {
        // the lower half holds the other middle sample as its maximum
        let below = lower.iter().copied().max().unwrap_or(0) as f64;
        (below + upper) / 2.0
    }
}

fn std_dev(slice: &ArrayView2<u16>) -> f64 {
    let n = slice.len() as f64;
    let mean = slice.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = slice
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn constant_slice_threshold_is_the_constant() {
        let slice = Array2::<u16>::from_elem((8, 8), 417);
        assert_eq!(find_threshold(&slice.view()), 417.0);
    }

    #[test]
    fn odd_count_uses_middle_sample() {
        // median 2, mean 2, population variance 2/3
        let slice = array![[1u16, 2, 3]];
        let expected = 2.0 + 3.0 * (2.0f64 / 3.0).sqrt();
        assert!((find_threshold(&slice.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn even_count_averages_middle_samples() {
        // median (2 + 4) / 2, mean 3.5, population variance 5.25
        let slice = array![[7u16, 1], [4, 2]];
        let expected = 3.0 + 3.0 * 5.25f64.sqrt();
        assert!((find_threshold(&slice.view()) - expected).abs() < 1e-12);
    }

    #[test]
    fn threshold_is_finite_for_full_range() {
        let slice = Array2::from_shape_fn((16, 16), |(r, c)| ((r * 16 + c) * 257) as u16);
        assert!(find_threshold(&slice.view()).is_finite());
    }

    #[test]
    fn empty_slice_is_zero() {
        let slice = Array2::<u16>::zeros((0, 4));
        assert_eq!(find_threshold(&slice.view()), 0.0);
    }
}
