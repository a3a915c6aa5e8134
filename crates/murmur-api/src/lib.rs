pub mod auth;
pub mod credentials;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod pages;
pub mod session;
