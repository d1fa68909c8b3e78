//! HTTP request handlers

pub mod api;

pub use api::{
    SearchUrl, SearchUrlQuery, api_configure, api_get_configure, api_search_status,
    api_search_url, api_state, health,
};
