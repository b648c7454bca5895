pub mod hospitals;
pub mod orders;
pub mod patients;
pub mod payments;
pub mod pharmacies;
pub mod sessions;
