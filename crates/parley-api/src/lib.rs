pub mod auth;
pub mod export;
pub mod messages;
pub mod middleware;
pub mod users;
