use crate::models::booking::VehicleType;

const BASE_SCORE: f64 = 0.5;
const RUSH_HOUR_FACTOR: f64 = 0.8;

/// Priority hint stored on the booking. Deterministic in the hour of day
/// and the vehicle tier; consumers treat it as a hint, never a guarantee.
pub fn matching_score(hour: u32, vehicle_type: VehicleType) -> f64 {
    let time_factor = if (7..=9).contains(&hour) {
        RUSH_HOUR_FACTOR
    } else {
        1.0
    };
    let tier_bonus = match vehicle_type {
        VehicleType::Premium => 0.05,
        VehicleType::Luxury => 0.1,
        VehicleType::Standard | VehicleType::Bike => 0.0,
    };

    BASE_SCORE * time_factor + tier_bonus
}

/// Scheduled bookings and premium tiers rank higher in the queue.
pub fn priority_weight(scheduled: bool, vehicle_type: VehicleType) -> u32 {
    let mut priority = 1;
    if scheduled {
        priority += 2;
    }
    if matches!(vehicle_type, VehicleType::Premium | VehicleType::Luxury) {
        priority += 1;
    }
    priority
}

#[cfg(test)]
mod tests {
    use super::{matching_score, priority_weight};
    use crate::models::booking::VehicleType;

    #[test]
    fn score_is_deterministic() {
        assert_eq!(
            matching_score(14, VehicleType::Standard),
            matching_score(14, VehicleType::Standard)
        );
    }

    #[test]
    fn rush_hour_lowers_the_time_factor() {
        let rush = matching_score(8, VehicleType::Standard);
        let off_peak = matching_score(14, VehicleType::Standard);
        assert!(rush < off_peak);
    }

    #[test]
    fn higher_tiers_score_higher() {
        let standard = matching_score(14, VehicleType::Standard);
        let premium = matching_score(14, VehicleType::Premium);
        let luxury = matching_score(14, VehicleType::Luxury);
        assert!(premium > standard);
        assert!(luxury > premium);
    }

    #[test]
    fn scheduled_and_premium_raise_priority() {
        assert_eq!(priority_weight(false, VehicleType::Standard), 1);
        assert_eq!(priority_weight(true, VehicleType::Standard), 3);
        assert_eq!(priority_weight(false, VehicleType::Luxury), 2);
        assert_eq!(priority_weight(true, VehicleType::Premium), 4);
    }
}
