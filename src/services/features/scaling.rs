/// Min-max scales `values` in place to [0, 1] using their own min and max.
///
/// A constant column (including a single value) has no range and maps to 0.
pub fn min_max_scale(values: &mut [f64]) {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    for value in values.iter_mut() {
        *value = if range > 0.0 {
            (*value - min) / range
        } else {
            0.0
        };
    }
}
