pub mod app;
pub mod bridge;
pub mod capability;
pub mod error;
pub mod notify;
pub mod observer;
