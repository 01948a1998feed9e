//! City tier lookup.

use crate::domain::CityTier;

/// Major metros bucketed as Tier 1. Everything else is Tier 2/3.
pub const TIER_1_CITIES: [&str; 10] = [
    "Bengaluru",
    "Bangalore",
    "Mumbai",
    "Delhi",
    "New Delhi",
    "Hyderabad",
    "Chennai",
    "Pune",
    "Gurgaon",
    "Noida",
];

/// Classify a city name. Total over all inputs; absent or blank is Tier 2/3.
pub fn classify(city: Option<&str>) -> CityTier {
    let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) else {
        return CityTier::Tier2And3;
    };
    let folded = city.to_lowercase();
    if TIER_1_CITIES.iter().any(|t| t.to_lowercase() == folded) {
        CityTier::Tier1
    } else {
        CityTier::Tier2And3
    }
}
