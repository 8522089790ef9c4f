//! Parking facility geometry and bay bookkeeping.

mod layout;

pub use layout::{BayKind, FacilityLayout, ParkingBay, Zone, ZoneKind};
