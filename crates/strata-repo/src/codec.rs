use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RepoResult, RepositoryError};

/// Converts domain objects to and from the text stored as an element payload.
pub trait PayloadCodec {
    type Object;

    fn serialize(&self, object: &Self::Object) -> RepoResult<String>;

    /// Fails with `MalformedPayload` on input it cannot read.
    fn parse(&self, text: &str) -> RepoResult<Self::Object>;
}

/// JSON codec for any serde type.
pub struct JsonCodec<T> {
    pretty: bool,
    _object: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            pretty: false,
            _object: PhantomData,
        }
    }

    /// Emit indented JSON.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            _object: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self {
            pretty: self.pretty,
            _object: PhantomData,
        }
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("object", &std::any::type_name::<T>())
            .field("pretty", &self.pretty)
            .finish()
    }
}

impl<T: Serialize + DeserializeOwned> PayloadCodec for JsonCodec<T> {
    type Object = T;

    fn serialize(&self, object: &T) -> RepoResult<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(object)
        } else {
            serde_json::to_string(object)
        };
        text.map_err(|e| RepositoryError::MalformedPayload(format!("serialize: {e}")))
    }

    fn parse(&self, text: &str) -> RepoResult<T> {
        serde_json::from_str(text).map_err(|e| RepositoryError::MalformedPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pipeline {
        name: String,
        steps: Vec<String>,
    }

    #[test]
    fn json_round_trip() {
        let codec = JsonCodec::<Pipeline>::new();
        let p = Pipeline {
            name: "load".into(),
            steps: vec!["read".into(), "write".into()],
        };
        let text = codec.serialize(&p).unwrap();
        assert_eq!(codec.parse(&text).unwrap(), p);
    }

    #[test]
    fn pretty_output_is_indented() {
        let codec = JsonCodec::<Pipeline>::pretty();
        let text = codec
            .serialize(&Pipeline {
                name: "x".into(),
                steps: vec![],
            })
            .unwrap();
        assert!(text.contains('\n'));
    }

    #[test]
    fn malformed_input_is_reported() {
        let codec = JsonCodec::<Pipeline>::default();
        assert!(matches!(
            codec.parse("{\"name\": 3}"),
            Err(RepositoryError::MalformedPayload(_))
        ));
    }
}
