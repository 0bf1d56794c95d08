//! Fixed search space: hazards crossed with coastal locations.

use crate::types::Hazard;

pub const HAZARDS: [Hazard; 8] = Hazard::SEARCHABLE;

pub const LOCATIONS: [&str; 22] = [
    // East coast
    "Kolkata",
    "Digha",
    "Puri",
    "Paradip",
    "Visakhapatnam",
    "Kakinada",
    "Chennai",
    "Thoothukudi",
    "Nagapattinam",
    "Puducherry",
    // West coast
    "Kandla",
    "Dwarka",
    "Mumbai",
    "Ratnagiri",
    "Panaji",
    "Mangaluru",
    "Kochi",
    "Alappuzha",
    "Thiruvananthapuram",
    // Islands
    "Port Blair",
    "Agatti",
    "Kavaratti",
];
