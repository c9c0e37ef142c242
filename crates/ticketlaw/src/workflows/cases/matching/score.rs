//! Pure lawyer-fitness scoring.
//!
//! Additive weighted score, linear interpolation throughout, no intermediate
//! rounding. The ceiling is 110 with the commercial-license bonus, 100
//! without.

use super::MatchRequest;
use crate::workflows::cases::domain::{LawyerProfile, ViolationType};

const SPECIALIZATION_POINTS: f64 = 40.0;
const SUCCESS_RATE_POINTS: f64 = 30.0;
const EXPERIENCE_POINTS: f64 = 15.0;
const EXPERIENCE_CEILING_YEARS: f64 = 20.0;
const RATING_POINTS: f64 = 10.0;
const LOAD_POINTS: f64 = 5.0;
const CDL_BONUS_POINTS: f64 = 10.0;

/// Score a lawyer's fitness for a case request. Deterministic, side-effect
/// free; identical inputs always produce the identical score.
pub fn score(lawyer: &LawyerProfile, request: &MatchRequest) -> f64 {
    let mut total = 0.0;

    if lawyer.specializes_in(request.violation_type) {
        total += SPECIALIZATION_POINTS;
    }

    total += f64::from(lawyer.statistics.success_rate) / 100.0 * SUCCESS_RATE_POINTS;

    let experience = f64::from(lawyer.years_of_experience) / EXPERIENCE_CEILING_YEARS
        * EXPERIENCE_POINTS;
    total += experience.min(EXPERIENCE_POINTS);

    total += lawyer.rating.average / 5.0 * RATING_POINTS;

    let load = f64::from(lawyer.availability.current_cases)
        / f64::from(lawyer.availability.max_cases);
    total += (1.0 - load) * LOAD_POINTS;

    if request.is_cdl_driver && lawyer.specializes_in(ViolationType::CdlViolations) {
        total += CDL_BONUS_POINTS;
    }

    total
}
