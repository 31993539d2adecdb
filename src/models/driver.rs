use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::booking::{LngLat, VehicleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub driver_id: String,
    pub name: String,
    pub status: DriverStatus,
    pub vehicle_type: VehicleType,
    pub location: LngLat,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
}
