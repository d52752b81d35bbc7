use serde::de::DeserializeOwned;
use thiserror::Error;

/// A deserialization failure with the JSON path where it happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("at JSON path {path} → {message}")]
pub struct PathError {
    pub path: String,
    pub message: String,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_path_error)
}

/// Same as [`from_str_with_path`], for an already-parsed document.
pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, PathError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(into_path_error)
}

fn into_path_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> PathError {
    PathError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn error_carries_the_failing_path() {
        let err = from_str_with_path::<BTreeMap<String, Vec<String>>>(r#"{"a-x": ["5", 3]}"#)
            .unwrap_err();
        assert_eq!(err.path, "a-x[1]");
        assert!(err.to_string().starts_with("at JSON path a-x[1] → "));
    }
}
