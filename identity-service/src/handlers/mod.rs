pub mod admin;
pub mod audit;
pub mod keys;
pub mod requests;
pub mod session;
pub mod users;
