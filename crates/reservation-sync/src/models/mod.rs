//! Domain types shared by every stage of a sync run.

mod property;
mod reservation;
mod run;
mod task;

pub use property::Property;
pub use reservation::{
    ExternalReservation, ReservationRecord, ReservationStatus, StatusClass, UnknownStatusPolicy,
    Validity,
};
pub use run::{RunCounters, SyncRun, SyncRunStatus, SyncWindow, LOOKAHEAD_DAYS};
pub use task::{Task, TaskStatus};
