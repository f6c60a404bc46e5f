pub mod ai;
pub mod booking_actions;
pub mod calendar;
pub mod conversation;
pub mod extract;
pub mod intent;
pub mod notify;
pub mod scheduling;
pub mod script;
