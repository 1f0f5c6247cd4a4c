//! Order Identifier Service.
//!
//! Generates order codes of shape `PREFIX-YYYYMMDD-SSSSSS`: a configured
//! prefix, the UTC date the code was issued and six random characters over
//! the Crockford base32 alphabet. Six characters give 2^30 codes per prefix
//! and day, so collisions are rare but possible; callers that persist a code
//! under a uniqueness constraint retry once with a fresh code.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;
use wizard_types::{OrderCode, OrderCodeError, ORDER_CODE_ALPHABET, ORDER_CODE_SUFFIX_LEN};

/// Generates and validates order codes for one prefix.
#[derive(Debug, Clone)]
pub struct OrderCodeGenerator {
	prefix: String,
}

impl OrderCodeGenerator {
	/// Creates a generator, rejecting prefixes that could never form a valid
	/// code.
	pub fn new(prefix: impl Into<String>) -> Result<Self, OrderCodeError> {
		let prefix = prefix.into();
		if !(2..=5).contains(&prefix.len()) || !prefix.bytes().all(|b| b.is_ascii_uppercase()) {
			return Err(OrderCodeError::Prefix(prefix));
		}
		Ok(Self { prefix })
	}

	pub fn prefix(&self) -> &str {
		&self.prefix
	}

	/// Generates a fresh code stamped with today's UTC date.
	pub fn generate(&self) -> Result<OrderCode, OrderCodeError> {
		self.generate_on(Utc::now().date_naive())
	}

	/// Generates a fresh code stamped with `date`.
	pub fn generate_on(&self, date: NaiveDate) -> Result<OrderCode, OrderCodeError> {
		OrderCode::from_parts(&self.prefix, date, &random_suffix())
	}

	/// Parses an externally supplied code, requiring this generator's prefix.
	pub fn parse(&self, code: &str) -> Result<OrderCode, OrderCodeError> {
		let parsed: OrderCode = code.trim().parse()?;
		if parsed.prefix() != self.prefix {
			return Err(OrderCodeError::Prefix(parsed.prefix().to_string()));
		}
		Ok(parsed)
	}

	/// Structural check of a code; performs no lookup.
	pub fn validate(&self, code: &str) -> bool {
		self.parse(code).is_ok()
	}
}

/// Draws the random suffix from the tail of a v4 UUID.
///
/// The last six bytes of a v4 UUID carry no version or variant bits, and
/// masking to five bits keeps the alphabet distribution uniform.
fn random_suffix() -> String {
	let bytes = Uuid::new_v4().into_bytes();
	bytes[bytes.len() - ORDER_CODE_SUFFIX_LEN..]
		.iter()
		.map(|b| ORDER_CODE_ALPHABET[(b & 0x1f) as usize] as char)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_generated_codes_validate() {
		let generator = OrderCodeGenerator::new("ORD").unwrap();
		for _ in 0..256 {
			let code = generator.generate().unwrap();
			assert!(generator.validate(code.as_str()), "{}", code);
			assert_eq!(code.prefix(), "ORD");
		}
	}

	#[test]
	fn test_consecutive_codes_differ() {
		let generator = OrderCodeGenerator::new("ORD").unwrap();
		let first = generator.generate().unwrap();
		let second = generator.generate().unwrap();
		assert_ne!(first, second);
	}

	#[test]
	fn test_date_stamp_is_embedded() {
		let generator = OrderCodeGenerator::new("DOC").unwrap();
		let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
		let code = generator.generate_on(date).unwrap();
		assert!(code.as_str().starts_with("DOC-20261018-"));
		assert_eq!(code.date(), Some(date));
	}

	#[test]
	fn test_validate_rejects_foreign_prefix_and_garbage() {
		let generator = OrderCodeGenerator::new("ORD").unwrap();
		assert!(generator.validate("ORD-20261018-7K3QZ9"));
		assert!(generator.validate(" ORD-20261018-7K3QZ9 "));
		assert!(!generator.validate("DOC-20261018-7K3QZ9"));
		assert!(!generator.validate("ORD-20261018-7K3QZ"));
		assert!(!generator.validate("ORD-20260230-7K3QZ9"));
		assert!(!generator.validate(""));
	}

	#[test]
	fn test_invalid_prefix_rejected() {
		assert!(OrderCodeGenerator::new("O").is_err());
		assert!(OrderCodeGenerator::new("ord").is_err());
		assert!(OrderCodeGenerator::new("ORDERS").is_err());
		assert!(OrderCodeGenerator::new("OR1").is_err());
	}
}
