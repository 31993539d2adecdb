use async_trait::async_trait;
use dashmap::DashMap;

use crate::geo;
use crate::models::booking::LngLat;
use crate::models::driver::Driver;

/// Nearby-driver lookup capability. The core only depends on this trait;
/// where the positions come from is an adapter concern.
#[async_trait]
pub trait DriverLocator: Send + Sync {
    async fn nearby_drivers(&self, center: LngLat, radius_m: f64) -> Vec<Driver>;
}

/// In-memory registry fed by the driver-location service through the
/// internal REST surface.
pub struct DriverRegistry {
    drivers: DashMap<String, Driver>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
        }
    }

    pub fn upsert(&self, driver: Driver) {
        self.drivers.insert(driver.driver_id.clone(), driver);
    }

    pub fn get(&self, driver_id: &str) -> Option<Driver> {
        self.drivers.get(driver_id).map(|entry| entry.clone())
    }

    pub fn list(&self) -> Vec<Driver> {
        self.drivers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverLocator for DriverRegistry {
    async fn nearby_drivers(&self, center: LngLat, radius_m: f64) -> Vec<Driver> {
        self.drivers
            .iter()
            .filter(|entry| geo::haversine_m(&center, &entry.location) <= radius_m)
            .map(|entry| entry.value().clone())
            .collect()
    }
}
