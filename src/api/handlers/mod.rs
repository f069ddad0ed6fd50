pub mod health;
pub mod protected;
pub mod well_known;
