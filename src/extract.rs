use axum::body::Body;
use error_stack::Report;
use serde::de::DeserializeOwned;

use crate::Error;

/// The largest request body that will be buffered.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Buffer a request body and deserialize it as JSON. Bodies over [BODY_LIMIT] and bodies that
/// fail to arrive are validation errors like any other bad input.
pub async fn read_json_body<T: DeserializeOwned>(body: Body) -> Result<T, Report<Error>> {
    let bytes = axum::body::to_bytes(body, BODY_LIMIT).await.map_err(|e| {
        Report::new(Error::Validation(format!(
            "Failed to read request body: {e}"
        )))
    })?;

    parse_json_body(&bytes)
}

/// Deserialize a JSON request body without requiring a content-type header. An empty body is read
/// as an empty object. Failures become a validation error naming the path of the bad field.
pub fn parse_json_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Report<Error>> {
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        bytes
    };

    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de).map_err(|e| {
        let path = e.path().to_string();
        let inner = e.into_inner();
        let message = if path == "." {
            format!("Invalid request body: {inner}")
        } else {
            format!("Invalid request body at {path}: {inner}")
        };
        Report::new(Error::Validation(message))
    })
}

#[cfg(test)]
mod test {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, Debug, PartialEq, Eq)]
    struct Data {
        title: Option<String>,
        count: Option<i32>,
    }

    #[test]
    fn empty_body_is_empty_object() {
        let data: Data = parse_json_body(b"  ").unwrap();
        assert_eq!(
            data,
            Data {
                title: None,
                count: None
            }
        );
    }

    #[test]
    fn bad_field_names_the_path() {
        let err = parse_json_body::<Data>(br#"{"count": "many"}"#).unwrap_err();
        let message = err.current_context().to_string();
        assert!(message.contains("count"), "{message}");
    }

    #[tokio::test]
    async fn oversized_body() {
        let body = Body::from(vec![b' '; BODY_LIMIT + 1]);
        let err = read_json_body::<Data>(body).await.unwrap_err();
        assert!(matches!(err.current_context(), Error::Validation(_)));

        let data: Data = read_json_body(Body::from(r#"{"count": 3}"#)).await.unwrap();
        assert_eq!(data.count, Some(3));
    }

    #[test]
    fn not_json() {
        let err = parse_json_body::<Data>(b"title=abc").unwrap_err();
        assert!(matches!(err.current_context(), Error::Validation(_)));
    }
}
