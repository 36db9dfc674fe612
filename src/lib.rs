//! Client core for a campus ride coordination service.
//!
//! [`session`] owns who is logged in, [`gate`] decides what they may see,
//! [`routes`] says where they are, and [`client`] makes every backend call.
//! [`api`], [`stats`] and [`view`] build the screens on top of those, and
//! [`cli`] exposes them on the command line.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod gate;
pub mod models;
pub mod routes;
pub mod session;
pub mod stats;
pub mod view;

pub use client::{ApiClient, ClientError};
pub use session::SessionStore;
