pub mod error;
pub mod scheduling;

pub use error::AppError;
pub use scheduling::{
    Appointment, AppointmentEvent, AppointmentStatus, Bill, BillStatus, Checkup, Doctor,
    InvalidTransition, PrescribedMedicine, Prescription, SlotKey, UnavailabilityBlock,
};
