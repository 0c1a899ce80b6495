use crate::quality::types::Grade;

/// Points for the completeness share (0.0–1.0), capped at 40.
fn completeness_points(completeness: f64) -> f64 {
    (completeness * 40.0).min(40.0)
}

/// Points for the duplicate percentage.
///
/// | Duplicates  | Points |
/// |-------------|--------|
/// | <= 1%       | 30     |
/// | <= 5%       | 20     |
/// | <= 10%      | 10     |
/// | > 10%       | 0      |
fn duplicate_points(duplicates_pct: f64) -> f64 {
    match duplicates_pct {
        p if p <= 1.0 => 30.0,
        p if p <= 5.0 => 20.0,
        p if p <= 10.0 => 10.0,
        _ => 0.0,
    }
}

/// Points for geocoding yield, capped at 30. A table without geocoding gets
/// the full 30.
fn geocoding_points(geo_success_rate: Option<f64>) -> f64 {
    match geo_success_rate {
        Some(rate) => (rate / 100.0 * 30.0).min(30.0),
        None => 30.0,
    }
}

/// Weighted quality score out of 100.
///
/// `geo_success_rate` is a percentage, or `None` when the table has no
/// geocoding column.
pub fn quality_score(completeness: f64, duplicates_pct: f64, geo_success_rate: Option<f64>) -> f64 {
    completeness_points(completeness)
        + duplicate_points(duplicates_pct)
        + geocoding_points(geo_success_rate)
}

/// Converts a 100-point score into a letter grade.
///
/// | Range       | Grade |
/// |-------------|-------|
/// | >= 90       | A     |
/// | >= 75       | B     |
/// | >= 60       | C     |
/// | >= 40       | D     |
/// | < 40        | F     |
pub fn grade(score: f64) -> Grade {
    match score {
        s if s >= 90.0 => Grade::A,
        s if s >= 75.0 => Grade::B,
        s if s >= 60.0 => Grade::C,
        s if s >= 40.0 => Grade::D,
        _ => Grade::F,
    }
}
