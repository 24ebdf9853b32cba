//! Piecewise-linear interpolation over sampled points.

/// Interpolates linearly between samples. `xs` must be sorted ascending;
/// repeated abscissae make a step, and the left value wins on the step
/// itself. Points outside the sampled range give `None`.
pub fn linear(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
  if xs.len() != ys.len() || xs.is_empty() || x.is_nan() {
    return None;
  }
  if x < xs[0] || x > xs[xs.len() - 1] {
    return None;
  }
  if xs.len() == 1 {
    return Some(ys[0]);
  }
  let hi = xs.partition_point(|v| *v < x).clamp(1, xs.len() - 1);
  let lo = hi - 1;
  let dx = xs[hi] - xs[lo];
  if dx == 0.0 {
    return Some(ys[lo]);
  }
  return Some(ys[lo] + (ys[hi] - ys[lo]) * (x - xs[lo]) / dx);
}

/// An interpolator over owned samples.
#[derive(Debug, Clone, Default)]
pub struct Linear {
  /// Abscissae, ascending.
  xs: Vec<f64>,
  /// Ordinates.
  ys: Vec<f64>
}

impl Linear {
  /// Takes samples as (x, y) pairs.
  pub fn new<I: IntoIterator<Item = (f64, f64)>>(points: I) -> Self {
    let (xs, ys) = points.into_iter().unzip();
    return Self { xs, ys };
  }

  /// Evaluates at a point.
  pub fn at(&self, x: f64) -> Option<f64> {
    return linear(&self.xs, &self.ys, x);
  }

  /// The largest abscissa, if any.
  pub fn x_max(&self) -> Option<f64> {
    return self.xs.last().copied();
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;
  use super::*;

  #[test]
  fn steps_and_ranges() {
    let f = Linear::new([(0.0, 1.0), (0.5, 1.0), (0.5, 3.0), (1.0, 3.0)]);
    assert_eq!(f.at(0.25), Some(1.0));
    assert_eq!(f.at(0.5), Some(1.0));
    assert_eq!(f.at(0.75), Some(3.0));
    assert_eq!(f.at(1.0), Some(3.0));
    assert_eq!(f.at(1.01), None);
    assert_eq!(linear(&[0.0, 10.0], &[0.0, 5.0], 4.0), Some(2.0));
    assert_eq!(linear(&[], &[], 0.0), None);
  }

  proptest! {
    #[test]
    fn stays_between_neighbours(
      mut xs in prop::collection::vec(-1.0e3..1.0e3f64, 2..10),
      ys in prop::collection::vec(-1.0e3..1.0e3f64, 10),
      t in 0.0..1.0f64
    ) {
      xs.sort_by(f64::total_cmp);
      let ys = &ys[..xs.len()];
      let x = xs[0] + t * (xs[xs.len() - 1] - xs[0]);
      let y = linear(&xs, ys, x).unwrap();
      let lo = ys.iter().copied().fold(f64::INFINITY, f64::min);
      let hi = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
      prop_assert!(y >= lo - 1e-9 && y <= hi + 1e-9);
    }
  }
}
