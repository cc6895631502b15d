pub mod account;
pub mod booking;
pub mod notification;
pub mod service;
pub mod technician;

pub use account::{Account, Role};
pub use booking::{
    Booking, BookingDraft, BookingStatus, Contact, Feedback, PriceOutOfRange, Pricing, Schedule,
    ServiceSnapshot, StatusHistoryEntry, MAX_SERVICE_PRICE,
};
pub use notification::{
    Delivery, InAppNotification, NotificationEvent, NotificationIntent, Recipient,
};
pub use service::ServiceItem;
pub use technician::{Technician, TechnicianLocation};
