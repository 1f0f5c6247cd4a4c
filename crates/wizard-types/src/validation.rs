//! Schema checks for backend configuration tables.
//!
//! A storage backend declares the keys its `[storage.implementations.<name>]`
//! table may hold. Keys outside the schema are rejected so that a misspelled
//! `ttl_draft` fails at startup instead of silently keeping drafts forever.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Unknown field: {0}")]
	UnknownField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: &'static str,
	},
}

/// Accepted type of a configuration key.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
	String,
	/// Integer within inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
}

impl FieldType {
	/// Integer of zero or more, the shape of every TTL and interval.
	pub fn non_negative() -> Self {
		FieldType::Integer {
			min: Some(0),
			max: None,
		}
	}

	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Boolean => "boolean",
		}
	}

	fn check(&self, field: &str, value: &toml::Value) -> Result<(), ValidationError> {
		let matches = match self {
			FieldType::String => value.is_str(),
			FieldType::Boolean => value.is_bool(),
			FieldType::Integer { min, max } => match value.as_integer() {
				Some(n) => {
					if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
						return Err(ValidationError::InvalidValue {
							field: field.to_string(),
							message: format!(
								"{} is outside {}..={}",
								n,
								min.map_or("".to_string(), |v| v.to_string()),
								max.map_or("".to_string(), |v| v.to_string()),
							),
						});
					}
					true
				},
				None => false,
			},
		};
		if matches {
			Ok(())
		} else {
			Err(ValidationError::TypeMismatch {
				field: field.to_string(),
				expected: self.name(),
				actual: value.type_str(),
			})
		}
	}
}

/// Keys a configuration table may hold.
#[derive(Debug, Default)]
pub struct Schema {
	fields: Vec<(String, FieldType, bool)>,
}

impl Schema {
	/// A schema accepting only an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	pub fn required(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
		self.fields.push((name.into(), field_type, true));
		self
	}

	pub fn optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
		self.fields.push((name.into(), field_type, false));
		self
	}

	/// Checks that `config` is a table holding the required keys, no keys
	/// outside the schema, and values of the declared types.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table",
				actual: config.type_str(),
			})?;

		for (name, field_type, required) in &self.fields {
			match table.get(name) {
				Some(value) => field_type.check(name, value)?,
				None if *required => return Err(ValidationError::MissingField(name.clone())),
				None => {},
			}
		}

		if let Some(unknown) = table
			.keys()
			.find(|key| !self.fields.iter().any(|(name, ..)| name == *key))
		{
			return Err(ValidationError::UnknownField(unknown.clone()));
		}

		Ok(())
	}
}

/// Trait implemented by every backend configuration schema.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new()
			.required("path", FieldType::String)
			.optional("ttl", FieldType::non_negative())
	}

	fn parse(input: &str) -> toml::Value {
		toml::from_str(input).unwrap()
	}

	#[test]
	fn test_missing_required_field() {
		assert!(matches!(
			schema().validate(&parse("ttl = 5")),
			Err(ValidationError::MissingField(f)) if f == "path"
		));
	}

	#[test]
	fn test_bounds_and_types() {
		assert!(matches!(
			schema().validate(&parse("path = \"x\"\nttl = -1")),
			Err(ValidationError::InvalidValue { .. })
		));
		assert!(matches!(
			schema().validate(&parse("path = 3")),
			Err(ValidationError::TypeMismatch { expected: "string", .. })
		));
		assert!(schema().validate(&parse("path = \"x\"\nttl = 60")).is_ok());
	}

	#[test]
	fn test_unknown_keys_are_rejected() {
		assert!(matches!(
			schema().validate(&parse("path = \"x\"\nttl_draft = 60")),
			Err(ValidationError::UnknownField(f)) if f == "ttl_draft"
		));
		assert!(Schema::new().validate(&parse("")).is_ok());
	}
}
