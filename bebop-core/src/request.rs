//! Inbound compile-request parsing and validation.

use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;
use crate::generator::Generator;

/// A validated request to compile a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CompilationRequest {
    /// Target language.
    pub generator: Generator,
    /// Logical output file name handed to the compiler; never touches disk.
    pub out_file: String,
    /// Optional namespace for the generated code.
    pub namespace: Option<String>,
    /// Full schema source text. May be empty.
    pub schema: String,
}

/// Remaining fields, read once the generator has been accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBody {
    out_file: String,
    #[serde(default)]
    namespace: Option<String>,
    schema: String,
}

impl CompilationRequest {
    /// Create a request directly from its parts.
    #[must_use]
    pub fn new(
        generator: Generator,
        out_file: impl Into<String>,
        namespace: Option<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            out_file: out_file.into(),
            namespace,
            schema: schema.into(),
        }
    }

    /// Parse and validate a JSON request body.
    ///
    /// The generator is checked before any other field.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidBody`] if the bytes are not a JSON object
    /// or a required field is missing or mistyped, and
    /// [`CoreError::InvalidGenerator`] if `generator` is absent, not a
    /// string, or not one of the supported aliases.
    pub fn from_json(body: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(body).map_err(invalid_body)?;
        let Value::Object(fields) = &value else {
            return Err(CoreError::InvalidBody {
                reason: "expected a JSON object".to_owned(),
            });
        };

        let generator = fields
            .get("generator")
            .and_then(Value::as_str)
            .ok_or(CoreError::InvalidGenerator)?
            .parse::<Generator>()?;

        let raw: RawBody = serde_json::from_value(value).map_err(invalid_body)?;

        Ok(Self {
            generator,
            out_file: raw.out_file,
            namespace: raw.namespace,
            schema: raw.schema,
        })
    }

    /// The namespace, if present and non-empty.
    #[must_use]
    pub fn effective_namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

fn invalid_body(err: serde_json::Error) -> CoreError {
    CoreError::InvalidBody {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<CompilationRequest, CoreError> {
        CompilationRequest::from_json(body.as_bytes())
    }

    #[test]
    fn full_body_parses_with_camel_case_keys() {
        let req = match parse(
            r#"{"generator":"ts","outFile":"out.ts","namespace":"Geo","schema":"struct Point { 1 -> int32 x; }"}"#,
        ) {
            Ok(r) => r,
            Err(e) => panic!("valid body rejected: {e}"),
        };
        assert_eq!(req.generator, Generator::TypeScript);
        assert_eq!(req.out_file, "out.ts");
        assert_eq!(req.namespace.as_deref(), Some("Geo"));
        assert!(req.schema.starts_with("struct Point"));
    }

    #[test]
    fn empty_schema_is_accepted() {
        let req = match parse(r#"{"generator":"rust","outFile":"lib.rs","schema":""}"#) {
            Ok(r) => r,
            Err(e) => panic!("empty schema rejected: {e}"),
        };
        assert!(req.schema.is_empty());
        assert!(req.namespace.is_none());
    }

    #[test]
    fn unsupported_generator_is_invalid_generator() {
        let err = parse(r#"{"generator":"go","outFile":"out.go","schema":"x"}"#);
        assert!(matches!(err, Err(CoreError::InvalidGenerator)), "got {err:?}");
    }

    #[test]
    fn missing_or_non_string_generator_is_invalid_generator() {
        for body in [
            r#"{"outFile":"a","schema":"x"}"#,
            r#"{"generator":null,"outFile":"a","schema":"x"}"#,
            r#"{"generator":7,"outFile":"a","schema":"x"}"#,
            r#"{"generator":["ts"],"outFile":"a","schema":"x"}"#,
        ] {
            assert!(
                matches!(parse(body), Err(CoreError::InvalidGenerator)),
                "body {body} must fail generator validation"
            );
        }
    }

    #[test]
    fn malformed_json_is_invalid_body() {
        assert!(matches!(parse("not json"), Err(CoreError::InvalidBody { .. })));
        assert!(matches!(parse(""), Err(CoreError::InvalidBody { .. })));
    }

    #[test]
    fn missing_schema_is_invalid_body() {
        let err = parse(r#"{"generator":"ts","outFile":"out.ts"}"#);
        match err {
            Err(CoreError::InvalidBody { reason }) => {
                assert!(reason.contains("schema"), "reason should name the field: {reason}");
            }
            other => panic!("expected InvalidBody, got {other:?}"),
        }
    }

    #[test]
    fn generator_is_checked_before_other_fields() {
        let err = parse(r#"{"generator":"go"}"#);
        assert!(matches!(err, Err(CoreError::InvalidGenerator)), "got {err:?}");

        let err = parse(r#"{"generator":"ts"}"#);
        match err {
            Err(CoreError::InvalidBody { reason }) => {
                assert!(reason.contains("outFile"), "reason should name the field: {reason}");
            }
            other => panic!("expected InvalidBody, got {other:?}"),
        }
    }

    #[test]
    fn non_object_json_is_invalid_body() {
        for body in ["[]", r#"["ts","out.ts"]"#, "7", "null", r#""ts""#] {
            assert!(
                matches!(parse(body), Err(CoreError::InvalidBody { .. })),
                "body {body} must fail as an invalid body"
            );
        }
    }

    #[test]
    fn mistyped_field_is_invalid_body() {
        let err = parse(r#"{"generator":"ts","outFile":3,"schema":""}"#);
        assert!(matches!(err, Err(CoreError::InvalidBody { .. })), "got {err:?}");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req = parse(r#"{"generator":"dart","outFile":"a.dart","schema":"","extra":1}"#);
        assert!(req.is_ok(), "extra fields must not fail parsing");
    }

    #[test]
    fn empty_namespace_is_not_effective() {
        let req = CompilationRequest::new(Generator::Cpp, "a.hpp", Some(String::new()), "");
        assert_eq!(req.effective_namespace(), None);
    }
}
