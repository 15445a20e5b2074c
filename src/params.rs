//! Request parameter decoding.
//!
//! URL parameters come from the query string and the captured path segments;
//! body parameters come from `application/x-www-form-urlencoded` or any
//! `json` content type. Everything lands in one JSON object map so controllers
//! see a single, uniformly typed parameter set.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{StrestError, StrestResult};
use crate::router::ParamVec;

/// Parameter map handed to controllers.
pub type Params = Map<String, Value>;

/// Parse a query string. Duplicate keys: last value wins.
#[must_use]
pub fn parse_query(query: Option<&str>) -> Params {
    let mut params = Params::new();
    if let Some(query) = query {
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            params.insert(k.into_owned(), Value::String(v.into_owned()));
        }
    }
    params
}

/// URL parameters: the query string, with captured path parameters taking
/// precedence over query keys of the same name.
#[must_use]
pub fn url_params(query: Option<&str>, path_params: &ParamVec) -> Params {
    let mut params = parse_query(query);
    for (name, value) in path_params {
        params.insert(name.to_string(), Value::String(value.clone()));
    }
    params
}

/// Decode body parameters according to the content type.
///
/// Unknown content types and empty bodies yield no parameters. A body that
/// claims to be JSON but is not a JSON object is a bad request.
pub fn parse_body(content_type: Option<&str>, body: Option<&[u8]>) -> StrestResult<Params> {
    let (Some(content_type), Some(body)) = (content_type, body) else {
        return Ok(Params::new());
    };
    if body.is_empty() {
        return Ok(Params::new());
    }

    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("form-urlencoded") {
        let mut params = Params::new();
        for (k, v) in url::form_urlencoded::parse(body) {
            params.insert(k.into_owned(), Value::String(v.into_owned()));
        }
        Ok(params)
    } else if content_type.contains("json") {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| StrestError::new(400, "Malformed JSON body").with_cause(e))?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StrestError::new(
                400,
                format!("JSON body must be an object, got {}", json_kind(&other)),
            )),
        }
    } else {
        debug!(content_type = %content_type, "Body not decoded into parameters");
        Ok(Params::new())
    }
}

/// Merge URL parameters then body parameters; body keys win on collision.
#[must_use]
pub fn merge(url: &Params, body: &Params) -> Params {
    let mut merged = url.clone();
    for (k, v) in body {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
