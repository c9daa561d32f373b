//! HTTP request handlers organized by domain

pub mod images;
pub mod index;
pub mod system;
