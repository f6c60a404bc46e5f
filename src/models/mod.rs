pub mod booking;
pub mod chat;
pub mod contact;
pub mod session;

pub use booking::{Booking, BookingStatus, BookingSummary};
pub use chat::{ChatIntent, ChatRequest, ChatResponse, ChatState, ChatStep, ReplyProvider, Slot};
pub use contact::{CommunicationStatus, Contact};
pub use session::RoiSession;
