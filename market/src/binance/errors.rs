use thiserror::Error;

/// Wire payload could not be turned into domain values.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing or invalid field `{0}`")]
    Field(&'static str),

    #[error("field `{field}` is not a number: {value:?}")]
    Number { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("undecodable response: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid response from exchange: {0}")]
    InvalidResponse(String),
}
