//! Business logic behind the HTTP endpoints.
//!
//! Each module exposes plain async functions over the wizard engine and a
//! module error that converts into the structured `APIError`.

pub mod drafts;
pub mod steps;
