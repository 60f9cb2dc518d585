//! Population normal ranges
//!
//! Fixed three-way table of `(activity_level, parameter) → [low, high]`
//! used by the range-based strategy and as the warm-up fallback for the
//! user-baseline strategy.

use crate::{ActivityLevel, VitalParameter};

/// Population `[low, high]` for a parameter at an activity level.
///
/// `Activity` itself has no normal range; it is the classifier input, not a
/// detected parameter.
pub fn normal_range(activity_level: ActivityLevel, parameter: VitalParameter) -> Option<[f64; 2]> {
    use ActivityLevel::*;
    use VitalParameter::*;

    let range = match (activity_level, parameter) {
        (Low, HeartRate) => [60.0, 80.0],
        (Low, BloodPressureSystolic) => [110.0, 120.0],
        (Low, BloodPressureDiastolic) => [70.0, 80.0],
        (Low, Temperature) => [36.1, 37.2],
        (Low, OxygenSaturation) => [95.0, 100.0],

        (Medium, HeartRate) => [80.0, 100.0],
        (Medium, BloodPressureSystolic) => [120.0, 140.0],
        (Medium, BloodPressureDiastolic) => [80.0, 90.0],
        (Medium, Temperature) => [36.5, 37.5],
        (Medium, OxygenSaturation) => [94.0, 99.0],

        (High, HeartRate) => [100.0, 160.0],
        (High, BloodPressureSystolic) => [140.0, 160.0],
        (High, BloodPressureDiastolic) => [90.0, 100.0],
        (High, Temperature) => [37.0, 38.0],
        (High, OxygenSaturation) => [92.0, 98.0],

        (_, Activity) => return None,
    };

    Some(range)
}
