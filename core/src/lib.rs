//! Client core for the to-do service.
//!
//! # Overview
//! `ItemStore` keeps a local `{items, filter}` view in step with the remote
//! item service and hands immutable `Snapshot`s to whatever presentation
//! layer sits on top. Every mutation is committed only after the service
//! confirms it.
//!
//! # Design
//! - `TodoClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`, so wire quirks stay in one place.
//! - `Transport` performs the round-trip; `UreqTransport` is the network
//!   implementation, tests plug in scripted ones.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod store;
pub mod transport;
pub mod types;

pub use client::TodoClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use store::{Intent, ItemStore, Listener, SubscriptionId};
pub use transport::{Transport, UreqTransport};
pub use types::{CreateItem, Filter, Item, ItemId, ParseFilterError, Snapshot};
