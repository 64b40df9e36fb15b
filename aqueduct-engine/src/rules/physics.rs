//! Physical models behind the propagation rules.

use std::f64::consts::PI;

/// Litres per cubic metre.
const LITRES_PER_M3: f64 = 1000.0;

/// Seconds for water to traverse a pipe.
///
/// `diameter_cm` and `length_m` describe the pipe, `flow` is in L/s. The
/// cross-section is `π·(d/200)²` m², the volume `1000·L·A` litres and the
/// transit time `V / flow`. Returns `None` for a non-positive or non-finite
/// flow and for geometry that does not give a finite time.
pub fn pipe_transit_seconds(diameter_cm: f64, length_m: f64, flow: f64) -> Option<f64> {
    if !flow.is_finite() || flow <= 0.0 {
        return None;
    }
    let radius_m = diameter_cm / 200.0;
    let area_m2 = PI * radius_m * radius_m;
    let volume_l = LITRES_PER_M3 * length_m * area_m2;
    let seconds = volume_l / flow;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// Split `flow` across outlets in proportion to their capacities.
///
/// Returns `None` when the total capacity is not positive.
pub fn junction_split(flow: f64, capacities: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = capacities.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some(capacities.iter().map(|c| flow * c / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_transit() {
        let seconds = pipe_transit_seconds(20.0, 100.0, 5.0).unwrap();
        assert!((seconds - 628.3).abs() < 0.1, "{}", seconds);
    }

    #[test]
    fn test_pipe_transit_degenerate_flow() {
        assert_eq!(pipe_transit_seconds(20.0, 100.0, 0.0), None);
        assert_eq!(pipe_transit_seconds(20.0, 100.0, -2.0), None);
        assert_eq!(pipe_transit_seconds(20.0, 100.0, f64::NAN), None);
        assert_eq!(pipe_transit_seconds(20.0, -100.0, 5.0), None);
    }

    #[test]
    fn test_junction_split_conserves_flow() {
        let split = junction_split(8.0, &[3.0, 1.0]).unwrap();
        assert!((split[0] - 6.0).abs() < 1e-9);
        assert!((split[1] - 2.0).abs() < 1e-9);
        assert!((split.iter().sum::<f64>() - 8.0).abs() < 1e-9);

        let uneven = junction_split(7.3, &[1.7, 2.9, 0.4]).unwrap();
        assert!((uneven.iter().sum::<f64>() - 7.3).abs() < 1e-9);
    }

    #[test]
    fn test_junction_split_without_capacity() {
        assert_eq!(junction_split(8.0, &[]), None);
        assert_eq!(junction_split(8.0, &[0.0, 0.0]), None);
    }
}
