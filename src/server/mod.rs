//! REST API server.

pub mod rest;
