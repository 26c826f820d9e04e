pub mod attempts;
pub mod events;
pub mod health;
pub mod reporting;
