//! Patient Records Module
//! Mission: Patients and the doctors, hospitals and illnesses linked to them

pub mod models;
pub mod store;

pub use models::{Doctor, Hospital, Illness, Patient, PatientDetails};
pub use store::{RecordStore, SubRecord, UpdateOutcome};
