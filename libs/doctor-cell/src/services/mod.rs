pub mod availability;
pub mod slot_grid;
pub mod unavailability;
