#![forbid(unsafe_code)]

pub mod handlers;
pub mod server;
pub mod view;

pub use server::{AppState, bind, router, serve};
