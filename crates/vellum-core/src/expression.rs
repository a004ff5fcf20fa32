/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Expression descriptors: the schema-relevant shape of one reference.

use vellum_syntax::{BlockStatement, Expression, Hash, Literal, MustacheStatement, PathExpression};

use crate::error::{CompileError, CompileResult};
use crate::schema::{DEFAULT_FIELD_TYPE, Field, MAX_PRIORITY, Options};

/// Hash keys that configure the field or branch instead of becoming options.
const RESERVED_HASH_KEYS: &[&str] = &["type", "priority", "label", "private", "collection", "sortable"];

/// The data path that names collections.
pub const COLLECTION_DATA: &str = "collection";

/// One parsed reference such as `this.title type="text" priority=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionDescriptor {
    pub original: String,
    pub parts: Vec<String>,
    /// Written with a leading `@`.
    pub data: bool,
    /// Alias the reference is scoped to; empty for a bare single segment.
    pub context: String,
    /// Trailing segment; empty when the path names a whole section.
    pub key: String,
    /// Literal hash values.
    pub hash: Options,
    pub priority: Option<u32>,
    pub private: bool,
}

impl ExpressionDescriptor {
    /// Describe `path` as written inside template `owner`.
    pub fn from_path(path: &PathExpression, hash: &Hash, owner: &str) -> CompileResult<Self> {
        let parts = path.parts.clone();
        let last = || parts.last().cloned().unwrap_or_default();

        let (context, key) = if path.data {
            let context = parts.first().cloned().unwrap_or_default();
            let key = if parts.len() > 1 { last() } else { String::new() };
            (context, key)
        } else {
            match parts.as_slice() {
                [] => ("this".to_string(), String::new()),
                [_] if path.this => ("this".to_string(), String::new()),
                [single] => (String::new(), single.clone()),
                [head, ..] if path.this || head == owner => ("this".to_string(), last()),
                [head, ..] => (head.clone(), last()),
            }
        };

        let mut hash_values = Options::new();
        for pair in &hash.pairs {
            hash_values.insert(pair.key.clone(), hash_value(&pair.value));
        }

        let priority = match hash.get("priority") {
            Some(value) => parse_priority(&path.original, value)?,
            None => None,
        };

        let private_flag = hash_values.get("private").is_some_and(|value| {
            value.as_bool() == Some(true) || value.as_str() == Some("true")
        });
        let private = private_flag
            || (path.data && parts.first().map(String::as_str) != Some(COLLECTION_DATA));

        Ok(Self {
            original: path.original.clone(),
            parts,
            data: path.data,
            context,
            key,
            hash: hash_values,
            priority,
            private,
        })
    }

    /// Describe a value expression such as `{{this.title label="Title"}}`.
    pub fn from_mustache(mustache: &MustacheStatement, owner: &str) -> CompileResult<Option<Self>> {
        match mustache.path.as_path() {
            Some(path) => Self::from_path(path, &mustache.hash, owner).map(Some),
            None => Ok(None),
        }
    }

    /// Describe the first parameter of a block, configured by the block's hash.
    pub fn from_block(block: &BlockStatement, owner: &str) -> CompileResult<Option<Self>> {
        Self::from_call(&block.params, &block.hash, owner)
    }

    /// Describe the first parameter of a helper call, configured by the
    /// call's hash.
    pub fn from_call(params: &[Expression], hash: &Hash, owner: &str) -> CompileResult<Option<Self>> {
        match params.first().and_then(Expression::as_path) {
            Some(path) => Self::from_path(path, hash, owner).map(Some),
            None => Ok(None),
        }
    }

    /// `@collection` or `@collection.NAME...`
    pub fn is_collection(&self) -> bool {
        self.data && self.parts.first().map(String::as_str) == Some(COLLECTION_DATA)
    }

    /// `NAME` in `@collection.NAME`.
    pub fn collection_name(&self) -> Option<&str> {
        if self.is_collection() {
            self.parts.get(1).map(String::as_str)
        } else {
            None
        }
    }

    /// Override the declared type.
    pub fn with_type(mut self, field_type: &str) -> Self {
        self.hash.insert(
            "type".to_string(),
            serde_json::Value::String(field_type.to_string()),
        );
        self
    }

    pub fn field_type(&self) -> Option<&str> {
        self.hash.get("type").and_then(serde_json::Value::as_str)
    }

    pub fn label(&self) -> Option<&str> {
        self.hash.get("label").and_then(serde_json::Value::as_str)
    }

    /// `collection="NAME"` on a collection-typed field.
    pub fn linked_collection(&self) -> Option<&str> {
        self.hash
            .get(COLLECTION_DATA)
            .and_then(serde_json::Value::as_str)
    }

    pub fn sortable(&self) -> bool {
        self.hash.get("sortable").is_some_and(|value| {
            value.as_bool() == Some(true) || value.as_str() == Some("true")
        })
    }

    /// Hash entries that are not reserved configuration keys.
    pub fn options(&self) -> Options {
        self.hash
            .iter()
            .filter(|(key, _)| !RESERVED_HASH_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// The field this reference declares.
    pub fn to_field(&self) -> Field {
        Field {
            key: self.key.clone(),
            field_type: self
                .field_type()
                .unwrap_or(DEFAULT_FIELD_TYPE)
                .to_string(),
            priority: self.priority,
            label: self.label().map(str::to_string),
            collection: None,
            options: self.options(),
        }
    }
}

/// JSON form of a hash value. Non-literal values keep their source text.
pub fn hash_value(expression: &Expression) -> serde_json::Value {
    match expression {
        Expression::Literal(Literal::String(s)) => serde_json::Value::String(s.clone()),
        Expression::Literal(Literal::Number(n)) => serde_json::Number::from_f64(*n)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Expression::Literal(Literal::Boolean(b)) => serde_json::Value::Bool(*b),
        Expression::Literal(Literal::Null | Literal::Undefined) => serde_json::Value::Null,
        Expression::Path(path) => serde_json::Value::String(path.original.clone()),
        Expression::SubExpression(sub) => serde_json::Value::String(sub.path.original.clone()),
    }
}

fn parse_priority(original: &str, value: &Expression) -> CompileResult<Option<u32>> {
    let invalid = |value: String| CompileError::InvalidPriority {
        expression: original.to_string(),
        value,
    };
    let number = match value {
        Expression::Literal(Literal::Number(n)) => *n,
        Expression::Literal(Literal::String(s)) => {
            s.trim().parse::<f64>().map_err(|_| invalid(s.clone()))?
        }
        Expression::Literal(Literal::Null | Literal::Undefined) => return Ok(None),
        other => return Err(invalid(hash_value(other).to_string())),
    };
    if !number.is_finite()
        || number < 0.0
        || number.fract() != 0.0
        || number > f64::from(MAX_PRIORITY)
    {
        return Err(invalid(number.to_string()));
    }
    Ok(Some(number as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_syntax::{HashPair, Span};

    fn path(original: &str) -> PathExpression {
        PathExpression::from_original(original, Span::default())
    }

    fn hash(pairs: &[(&str, Expression)]) -> Hash {
        Hash {
            pairs: pairs
                .iter()
                .map(|(key, value)| HashPair {
                    key: key.to_string(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    fn describe(original: &str) -> ExpressionDescriptor {
        ExpressionDescriptor::from_path(&path(original), &Hash::default(), "index").unwrap()
    }

    #[test]
    fn test_this_context() {
        let expr = describe("this.title");
        assert_eq!(expr.context, "this");
        assert_eq!(expr.key, "title");
        assert!(!expr.private);
    }

    #[test]
    fn test_own_name_means_this() {
        let expr = describe("index.title");
        assert_eq!(expr.context, "this");
        assert_eq!(expr.key, "title");
    }

    #[test]
    fn test_alias_context_uses_trailing_segment() {
        let expr = describe("post.author.name");
        assert_eq!(expr.context, "post");
        assert_eq!(expr.key, "name");
    }

    #[test]
    fn test_bare_segment_has_empty_context() {
        let expr = describe("title");
        assert_eq!(expr.context, "");
        assert_eq!(expr.key, "title");
    }

    #[test]
    fn test_data_paths() {
        let index = describe("@index");
        assert!(index.private);

        let posts = describe("@collection.posts");
        assert!(!posts.private);
        assert!(posts.is_collection());
        assert_eq!(posts.collection_name(), Some("posts"));

        let bare = describe("@collection");
        assert!(bare.is_collection());
        assert_eq!(bare.collection_name(), None);
    }

    #[test]
    fn test_hash_configuration() {
        let expr = ExpressionDescriptor::from_path(
            &path("this.date"),
            &hash(&[
                ("type", Expression::Literal(Literal::String("date".into()))),
                ("priority", Expression::Literal(Literal::Number(2.0))),
                ("label", Expression::Literal(Literal::String("When".into()))),
                ("format", Expression::Literal(Literal::String("short".into()))),
            ]),
            "index",
        )
        .unwrap();

        let field = expr.to_field();
        assert_eq!(field.field_type, "date");
        assert_eq!(field.priority, Some(2));
        assert_eq!(field.label.as_deref(), Some("When"));
        assert_eq!(field.options.len(), 1);
        assert_eq!(field.options["format"], serde_json::json!("short"));
    }

    #[test]
    fn test_private_hash_flag() {
        let expr = ExpressionDescriptor::from_path(
            &path("this.internal"),
            &hash(&[("private", Expression::Literal(Literal::Boolean(true)))]),
            "index",
        )
        .unwrap();
        assert!(expr.private);
    }

    #[test]
    fn test_invalid_priorities() {
        for value in [
            Expression::Literal(Literal::Number(-1.0)),
            Expression::Literal(Literal::Number(f64::NAN)),
            Expression::Literal(Literal::Number(1.5)),
            Expression::Literal(Literal::Number(4_294_967_295.0)),
            Expression::Literal(Literal::String("high".into())),
        ] {
            let result = ExpressionDescriptor::from_path(
                &path("this.title"),
                &hash(&[("priority", value)]),
                "index",
            );
            assert!(matches!(result, Err(CompileError::InvalidPriority { .. })));
        }
    }

    #[test]
    fn test_numeric_string_priority() {
        let expr = ExpressionDescriptor::from_path(
            &path("this.title"),
            &hash(&[("priority", Expression::Literal(Literal::String("3".into())))]),
            "index",
        )
        .unwrap();
        assert_eq!(expr.priority, Some(3));
    }
}
