//! Draft records, local snapshots and order codes.
//!
//! A draft record is the durable counterpart of a [`WizardState`], keyed by a
//! human-shareable [`OrderCode`]. A local snapshot is the versioned copy kept
//! in the local cache.

use crate::{StepId, WizardState};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Alphabet of the random suffix (Crockford base32: no I, L, O, U).
pub const ORDER_CODE_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
/// Number of characters in the random suffix.
pub const ORDER_CODE_SUFFIX_LEN: usize = 6;
/// Format of the date stamp segment.
pub const ORDER_CODE_DATE_FORMAT: &str = "%Y%m%d";

/// Errors produced when parsing an order code.
#[derive(Debug, Error, PartialEq)]
pub enum OrderCodeError {
	#[error("Order code must have the shape PREFIX-YYYYMMDD-SUFFIX: {0}")]
	Shape(String),
	#[error("Invalid order code prefix: {0}")]
	Prefix(String),
	#[error("Invalid order code date stamp: {0}")]
	DateStamp(String),
	#[error("Invalid order code suffix: {0}")]
	Suffix(String),
}

/// Human-shareable order identifier of shape `PREFIX-YYYYMMDD-SUFFIX`.
///
/// Construction always goes through structural validation, so holding an
/// `OrderCode` means the format is known to be valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderCode(String);

impl OrderCode {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Leading segment of the code.
	pub fn prefix(&self) -> &str {
		self.0.split('-').next().unwrap_or_default()
	}

	/// Date encoded in the code.
	pub fn date(&self) -> Option<NaiveDate> {
		let stamp = self.0.split('-').nth(1)?;
		NaiveDate::parse_from_str(stamp, ORDER_CODE_DATE_FORMAT).ok()
	}

	/// Assembles a code from its segments, validating the result.
	pub fn from_parts(prefix: &str, date: NaiveDate, suffix: &str) -> Result<Self, OrderCodeError> {
		format!("{}-{}-{}", prefix, date.format(ORDER_CODE_DATE_FORMAT), suffix).parse()
	}
}

impl FromStr for OrderCode {
	type Err = OrderCodeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let parts: Vec<&str> = s.split('-').collect();
		let [prefix, stamp, suffix] = parts.as_slice() else {
			return Err(OrderCodeError::Shape(s.to_string()));
		};

		if !(2..=5).contains(&prefix.len()) || !prefix.bytes().all(|b| b.is_ascii_uppercase()) {
			return Err(OrderCodeError::Prefix(prefix.to_string()));
		}

		if stamp.len() != 8
			|| !stamp.bytes().all(|b| b.is_ascii_digit())
			|| NaiveDate::parse_from_str(stamp, ORDER_CODE_DATE_FORMAT).is_err()
		{
			return Err(OrderCodeError::DateStamp(stamp.to_string()));
		}

		if suffix.len() != ORDER_CODE_SUFFIX_LEN
			|| !suffix.bytes().all(|b| ORDER_CODE_ALPHABET.contains(&b))
		{
			return Err(OrderCodeError::Suffix(suffix.to_string()));
		}

		Ok(Self(s.to_string()))
	}
}

impl TryFrom<String> for OrderCode {
	type Error = OrderCodeError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<OrderCode> for String {
	fn from(code: OrderCode) -> Self {
		code.0
	}
}

impl fmt::Display for OrderCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Lifecycle status of a draft record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
	/// Being filled in by the user.
	Draft,
	/// Handed over for fulfillment.
	Submitted,
	/// Picked up by an operator.
	Processing,
	/// Fulfilled.
	Completed,
	/// Abandoned or rejected.
	Cancelled,
}

impl DraftStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, DraftStatus::Completed | DraftStatus::Cancelled)
	}

	/// Whether the wizard may still write to a record with this status.
	pub fn accepts_edits(&self) -> bool {
		matches!(self, DraftStatus::Draft)
	}
}

impl fmt::Display for DraftStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DraftStatus::Draft => write!(f, "Draft"),
			DraftStatus::Submitted => write!(f, "Submitted"),
			DraftStatus::Processing => write!(f, "Processing"),
			DraftStatus::Completed => write!(f, "Completed"),
			DraftStatus::Cancelled => write!(f, "Cancelled"),
		}
	}
}

/// Durable, remotely shared snapshot of an in-progress order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
	pub code: OrderCode,
	/// Service the order was started for.
	pub service_id: String,
	pub status: DraftStatus,
	/// Revision of the wizard state held by this record. Writes carrying an
	/// older revision are ignored.
	pub revision: u64,
	pub state: WizardState,
	pub created_at: u64,
	pub updated_at: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub submitted_at: Option<u64>,
}

/// Versioned local copy of the wizard progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSnapshot {
	pub cache_version: u32,
	pub service_id: String,
	pub saved_at: u64,
	/// Step ids of the graph the state was captured against.
	pub steps: Vec<StepId>,
	pub state: WizardState,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_valid_code() {
		let code: OrderCode = "ORD-20261018-7K3QZ9".parse().unwrap();
		assert_eq!(code.prefix(), "ORD");
		assert_eq!(code.date(), NaiveDate::from_ymd_opt(2026, 10, 18));
		assert_eq!(code.to_string(), "ORD-20261018-7K3QZ9");
	}

	#[test]
	fn test_reject_malformed_codes() {
		let cases = [
			("ORD20261018-7K3QZ9", "shape"),
			("ORD-20261018-7K3QZ9-X", "shape"),
			("ord-20261018-7K3QZ9", "prefix"),
			("O-20261018-7K3QZ9", "prefix"),
			("ORDERS-20261018-7K3QZ9", "prefix"),
			("ORD-20261318-7K3QZ9", "date"),
			("ORD-2026101-7K3QZ9", "date"),
			("ORD-20261018-7K3QZI", "suffix"),
			("ORD-20261018-7k3qz9", "suffix"),
			("ORD-20261018-7K3QZ", "suffix"),
		];
		for (input, kind) in cases {
			let err = input.parse::<OrderCode>().unwrap_err();
			let matches_kind = match kind {
				"shape" => matches!(err, OrderCodeError::Shape(_)),
				"prefix" => matches!(err, OrderCodeError::Prefix(_)),
				"date" => matches!(err, OrderCodeError::DateStamp(_)),
				_ => matches!(err, OrderCodeError::Suffix(_)),
			};
			assert!(matches_kind, "{} should fail as {}, got {:?}", input, kind, err);
		}
	}

	#[test]
	fn test_deserialize_validates() {
		let ok: Result<OrderCode, _> = serde_json::from_str("\"AB-20250101-000000\"");
		assert!(ok.is_ok());
		let bad: Result<OrderCode, _> = serde_json::from_str("\"not-a-code\"");
		assert!(bad.is_err());
	}

	#[test]
	fn test_status_edit_rules() {
		assert!(DraftStatus::Draft.accepts_edits());
		assert!(!DraftStatus::Submitted.accepts_edits());
		assert!(DraftStatus::Cancelled.is_terminal());
		assert!(!DraftStatus::Processing.is_terminal());
	}
}
