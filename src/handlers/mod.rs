pub mod about;
pub mod auth;
pub mod gallery;
pub mod posts;
pub mod upload;
