pub mod appointment;
pub mod conversation;
pub mod report;
pub mod user;

pub use appointment::*;
pub use conversation::*;
pub use report::*;
pub use user::*;
