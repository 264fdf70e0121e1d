//! Accounts — users and their patient profiles.

pub mod model;

pub use model::{
    Account, Gender, NewAccount, PatientDetails, PatientProfile, PatientUpdate, Session,
    User, UserRole,
};
