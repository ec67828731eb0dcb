//! Typed extraction of required query parameters

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

/// A query parameter a route cannot do without
pub trait RequiredParam: Sized {
    /// Name in the query string, also used in the 400 message
    const NAME: &'static str;

    fn from_value(value: String) -> Self;
}

/// bilibili video identifier, e.g. `BV1xx411c7mD`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bvid(pub String);

impl RequiredParam for Bvid {
    const NAME: &'static str = "bvid";

    fn from_value(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of one video part's danmaku track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cid(pub String);

impl RequiredParam for Cid {
    const NAME: &'static str = "cid";

    fn from_value(value: String) -> Self {
        Self(value)
    }
}

/// Find `name` in a raw query string.
///
/// The first occurrence wins. An empty value is reported as absent.
pub fn query_value(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Extractor that rejects with [`ApiError::MissingParam`] when `P` is absent
#[derive(Debug)]
pub struct Required<P>(pub P);

#[async_trait]
impl<S, P> FromRequestParts<S> for Required<P>
where
    S: Send + Sync,
    P: RequiredParam,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match query_value(parts.uri.query(), P::NAME) {
            Some(value) => Ok(Required(P::from_value(value))),
            None => {
                tracing::debug!(param = P::NAME, path = %parts.uri.path(), "Missing query parameter");
                Err(ApiError::MissingParam(P::NAME))
            }
        }
    }
}
