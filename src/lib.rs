//! ProfileVault Backend Library
//!
//! Account registration with profile media, password login and rotating
//! refresh-token sessions.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;
pub mod users;
