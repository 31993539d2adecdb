use crate::models::booking::{Fare, VehicleType};

pub const DEFAULT_CURRENCY: &str = "VND";
// Policy default, not configurable.
pub const CANCELLATION_FEE_RATE: f64 = 0.5;

struct TierRates {
    base: f64,
    per_km: f64,
    per_min: f64,
}

const fn rates(vehicle_type: VehicleType) -> TierRates {
    match vehicle_type {
        VehicleType::Bike => TierRates {
            base: 10_000.0,
            per_km: 4_000.0,
            per_min: 300.0,
        },
        VehicleType::Standard => TierRates {
            base: 15_000.0,
            per_km: 9_000.0,
            per_min: 500.0,
        },
        VehicleType::Premium => TierRates {
            base: 25_000.0,
            per_km: 14_000.0,
            per_min: 800.0,
        },
        VehicleType::Luxury => TierRates {
            base: 40_000.0,
            per_km: 22_000.0,
            per_min: 1_200.0,
        },
    }
}

pub fn estimate(vehicle_type: VehicleType, distance_km: f64, duration_min: i64) -> Fare {
    let tier = rates(vehicle_type);
    let mut fare = Fare {
        base_fare: tier.base,
        distance_fare: (tier.per_km * distance_km).round(),
        time_fare: (tier.per_min * duration_min as f64).round(),
        surge_multiplier: 1.0,
        total_fare: 0.0,
        currency: DEFAULT_CURRENCY.to_string(),
    };
    fare.recompute();
    fare
}

/// Share of the total fare forfeited to the driver side when the passenger
/// cancels inside the grace window.
pub fn cancellation_fee(fare: &Fare) -> f64 {
    (fare.total_fare * CANCELLATION_FEE_RATE).round()
}
