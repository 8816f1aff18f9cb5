//! Clients for the two remote collaborators: the lock service and the graph store.

mod graph;
mod lock;

pub use graph::*;
pub use lock::*;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::auth::{API_KEY_HEADER, PARTITION_KEY_HEADER, USER_ID_HEADER};
use crate::errors::TreeError;
use crate::models::TreeContext;

/// Build a reqwest client that sends the service key on every request.
fn build_http_client(api_psk: Option<&str>, timeout: Duration) -> Result<reqwest::Client, TreeError> {
    let mut headers = HeaderMap::new();
    if let Some(key) = api_psk {
        let value = HeaderValue::from_str(key)
            .map_err(|_| TreeError::Unauthorized("API key is not a valid header value".into()))?;
        headers.insert(API_KEY_HEADER, value);
    }

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

/// Attach the tree scope of a call.
fn scoped(request: reqwest::RequestBuilder, ctx: &TreeContext) -> reqwest::RequestBuilder {
    request
        .header(PARTITION_KEY_HEADER, &ctx.tree_id)
        .header(USER_ID_HEADER, &ctx.user_id)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
