pub mod action_token;
pub mod bookings;
pub mod email;
pub mod lifecycle;
pub mod notifier;
pub mod policy;
pub mod session;
pub mod signing;
pub mod validation;
