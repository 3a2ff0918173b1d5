pub mod admin_service;
pub mod appointment_service;
pub mod auth_service;
pub mod doctor_service;
pub mod message_service;
pub mod payment_service;
pub mod report_service;
pub mod video_service;

pub use payment_service::{PaymentGateway, RazorpayGateway};
