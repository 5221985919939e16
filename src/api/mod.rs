//! API layer for HTTP request handling.
//!
//! Two endpoints:
//!
//! - `GET /` - static upload page (embedded asset)
//! - `POST /process_csv` - multipart CSV upload, logged then archived

pub mod handlers;
