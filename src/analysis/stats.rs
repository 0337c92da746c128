/// Running mean. A run of equal values returns that value exactly.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut m = 0.0;
    let mut n = 0usize;
    for v in values {
        n += 1;
        m += (v - m) / n as f64;
    }
    (n > 0).then_some(m)
}

/// Pearson correlation of two equal-length samples.
/// `None` when there are fewer than two pairs or either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs.iter().copied())?;
    let my = mean(ys.iter().copied())?;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean([1.0, 2.0, 3.0, 6.0]), Some(3.0));
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(mean([0.1; 12]), Some(0.1));
    }

    #[test]
    fn test_pearson() {
        let r = pearson(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0, 4.0], &[1.0, 3.0, 2.0, 4.0]).unwrap();
        assert!((r - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_degenerate() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[2.0]), None);
    }
}
