//! Stateless HTTP request builder and response parser for the to-do service.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each remote operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. Quirks of the service's wire shapes (the singular
//! `items` object returned by create, path-segment booleans) stop here;
//! callers only see `Item` values and `ApiError`.

use std::collections::HashSet;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{CreateItem, Filter, Item, ItemId};

/// Characters escaped when an id is placed in a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Synchronous, stateless client for the to-do service.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_list_items(&self, filter: Filter) -> HttpRequest {
        let path = match filter.done_flag() {
            None => format!("{}/items", self.base_url),
            Some(done) => format!("{}/items/filter/{done}", self.base_url),
        };
        HttpRequest {
            method: HttpMethod::Get,
            path,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create_item(&self, text: &str) -> Result<HttpRequest, ApiError> {
        let input = CreateItem {
            item: text.to_string(),
        };
        let body = serde_json::to_string(&input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}/item/create", self.base_url),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    pub fn build_delete_item(&self, id: &ItemId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: format!("{}/item/delete/{}", self.base_url, encode_segment(id)),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_update_done(&self, id: &ItemId, done: bool) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Patch,
            path: format!("{}/item/update/{}/{done}", self.base_url, encode_segment(id)),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_list_items(&self, response: HttpResponse) -> Result<Vec<Item>, ApiError> {
        let body = parse_json(&response)?;
        let raw = body
            .get("items")
            .filter(|v| v.is_array())
            .ok_or_else(|| ApiError::MalformedResponse("listing has no `items` array".to_string()))?;
        let items: Vec<Item> =
            serde_json::from_value(raw.clone()).map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            check_text(item)?;
            if !seen.insert(&item.id) {
                return Err(ApiError::MalformedResponse(format!("duplicate item id {}", item.id)));
            }
        }
        Ok(items)
    }

    /// The service returns the created item under the key `items` even
    /// though it is a single object; `item` is accepted as well.
    pub fn parse_create_item(&self, response: HttpResponse) -> Result<Item, ApiError> {
        let body = parse_json(&response)?;
        let raw = body
            .get("items")
            .or_else(|| body.get("item"))
            .filter(|v| v.is_object())
            .ok_or_else(|| ApiError::MalformedResponse("create response has no item".to_string()))?;
        match raw.get("id") {
            None | Some(Value::Null) => {
                return Err(ApiError::MalformedResponse("created item has no id".to_string()));
            }
            Some(Value::String(s)) if s.is_empty() => {
                return Err(ApiError::MalformedResponse("created item has an empty id".to_string()));
            }
            Some(_) => {}
        }
        let item: Item =
            serde_json::from_value(raw.clone()).map_err(|e| ApiError::MalformedResponse(e.to_string()))?;
        check_text(&item)?;
        Ok(item)
    }

    pub fn parse_delete_item(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_update_done(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn encode_segment(id: &ItemId) -> String {
    utf8_percent_encode(id.as_str(), PATH_SEGMENT).to_string()
}

fn check_text(item: &Item) -> Result<(), ApiError> {
    if item.text.trim().is_empty() {
        return Err(ApiError::MalformedResponse(format!("item {} has empty text", item.id)));
    }
    Ok(())
}

/// Map non-2xx status codes to `ServiceRejected`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::ServiceRejected {
        status: response.status,
        body: response.body.clone(),
    })
}

fn parse_json(response: &HttpResponse) -> Result<Value, ApiError> {
    check_status(response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Network(format!("unreadable response body: {e}")))
}
