pub mod chat;
pub mod question;
pub mod types;
