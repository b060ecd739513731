//! recsync-http - HTTP-backed record service.
//!
//! [`HttpService`] speaks a small JSON API: `POST /v1/records:query`,
//! `POST /v1/records:page`, `PUT /v1/records/{id}` and
//! `DELETE /v1/records/{id}`.

mod client;
mod endpoints;
mod service;

pub use service::HttpService;
