pub mod admin;
pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod payments;
pub mod reports;
pub mod swagger;
pub mod video;
