//! File-based storage backend.
//!
//! Each key is stored as one binary file made of a fixed-size header carrying
//! the expiration time followed by the JSON payload. Expired files read as
//! missing and are removed by `cleanup_expired`.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use wizard_types::{
	current_timestamp, ConfigSchema, FieldType, ImplementationRegistry, Schema, StorageKey,
	ValidationError,
};

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header for TTL support.
///
/// Binary layout (32 bytes total):
/// - [0-3]: Magic bytes "OWZD"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-31]: Reserved
#[derive(Debug, Clone, PartialEq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"OWZD";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	/// Creates a new header expiring `ttl` from now; a zero TTL never expires.
	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			current_timestamp().saturating_add(ttl.as_secs())
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unknown file format".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && current_timestamp() >= self.expires_at
	}

	/// Prepends the header to a payload.
	fn wrap(&self, value: &[u8]) -> Vec<u8> {
		let mut file_data = Vec::with_capacity(Self::SIZE + value.len());
		file_data.extend_from_slice(&self.serialize());
		file_data.extend_from_slice(value);
		file_data
	}
}

/// TTL configuration for the different storage namespaces.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Reads `ttl_<namespace>` entries (seconds) from the backend table.
	fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all() {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.and_then(|v| u64::try_from(v).ok())
				{
					ttls.insert(storage_key, Duration::from_secs(ttl_value));
				}
			}
		}

		Self { ttls }
	}

	/// Sets the TTL of one namespace.
	pub fn with_ttl(mut self, key: StorageKey, ttl: Duration) -> Self {
		self.ttls.insert(key, ttl);
		self
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for the different namespaces.
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', '\\', ':'], "_");
		self.base_path.join(format!("{}.bin", safe_key))
	}

	/// Resolves the TTL of a key from its namespace ("drafts:ORD-..." -> drafts).
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	async fn ensure_base_dir(&self) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	/// Reads the header of a file, if the file exists and has a valid one.
	async fn read_header(&self, path: &PathBuf) -> Option<FileHeader> {
		let data = fs::read(path).await.ok()?;
		FileHeader::deserialize(&data).ok()
	}

	/// Removes all expired files from storage.
	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			match self.read_header(&path).await {
				Some(header) if header.is_expired() => {
					if let Err(e) = fs::remove_file(&path).await {
						tracing::warn!("Failed to remove expired file {:?}: {}", path, e);
					} else {
						removed += 1;
					}
				},
				Some(_) => {},
				None => {
					tracing::debug!("Skipping file {:?}: no readable header", path);
				},
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		let data = match fs::read(&path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}
		Ok(data[FileHeader::SIZE..].to_vec())
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.ensure_base_dir().await?;
		let path = self.get_file_path(key);
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let file_data = FileHeader::new(ttl).wrap(&value);

		// Write atomically by writing to temp file then renaming
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn insert_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.ensure_base_dir().await?;
		let path = self.get_file_path(key);

		// An expired leftover does not count as taken.
		if let Some(header) = self.read_header(&path).await {
			if header.is_expired() {
				self.delete(key).await?;
			}
		}

		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let file_data = FileHeader::new(ttl).wrap(&value);

		let mut file = match fs::OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&path)
			.await
		{
			Ok(file) => file,
			Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
				return Err(StorageError::AlreadyExists(key.to_string()))
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		file.write_all(&file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		file.flush()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		match fs::remove_file(&path).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		Ok(self
			.read_header(&path)
			.await
			.is_some_and(|header| !header.is_expired()))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let base = Schema::new().optional("storage_path", FieldType::String);
		StorageKey::all()
			.fold(base, |schema, key| {
				schema.optional(format!("ttl_{}", key.as_str()), FieldType::non_negative())
			})
			.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_drafts`: TTL in seconds for draft records (default: 0, never expire)
/// - `ttl_snapshots`: TTL in seconds for local snapshots (default: 0)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage(dir: &TempDir, ttl_config: TtlConfig) -> FileStorage {
		FileStorage::new(dir.path().to_path_buf(), ttl_config)
	}

	#[test]
	fn test_header_round_trip() {
		let header = FileHeader::new(Duration::from_secs(60));
		let parsed = FileHeader::deserialize(&header.serialize()).unwrap();
		assert_eq!(parsed, header);
		assert!(!parsed.is_expired());
		assert!(FileHeader::deserialize(b"short").is_err());
	}

	#[tokio::test]
	async fn test_set_get_delete() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir, TtlConfig::default());

		let key = "drafts:ORD-20261018-7K3QZ9";
		storage.set_bytes(key, b"{}".to_vec(), None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), b"{}".to_vec());
		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));
		// Deleting a missing key is not an error.
		storage.delete(key).await.unwrap();
	}

	#[tokio::test]
	async fn test_insert_is_create_only() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir, TtlConfig::default());

		storage
			.insert_bytes("drafts:A", b"first".to_vec(), None)
			.await
			.unwrap();
		let second = storage
			.insert_bytes("drafts:A", b"second".to_vec(), None)
			.await;
		assert!(matches!(second, Err(StorageError::AlreadyExists(_))));
		assert_eq!(
			storage.get_bytes("drafts:A").await.unwrap(),
			b"first".to_vec()
		);
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir, TtlConfig::default());

		// Forge an already expired file.
		let expired = FileHeader {
			version: FileHeader::VERSION,
			expires_at: 1,
		};
		let path = storage.get_file_path("drafts:old");
		std::fs::write(&path, expired.wrap(b"{}")).unwrap();
		storage
			.set_bytes("drafts:new", b"{}".to_vec(), None)
			.await
			.unwrap();

		assert!(!storage.exists("drafts:old").await.unwrap());
		assert!(matches!(
			storage.get_bytes("drafts:old").await,
			Err(StorageError::NotFound)
		));

		let removed = storage.cleanup_expired().await.unwrap();
		assert_eq!(removed, 1);
		assert!(!path.exists());
		assert!(storage.exists("drafts:new").await.unwrap());

		// An expired key can be claimed again by a create-only write.
		std::fs::write(&path, expired.wrap(b"{}")).unwrap();
		storage
			.insert_bytes("drafts:old", b"{}".to_vec(), None)
			.await
			.unwrap();
	}

	#[test]
	fn test_ttl_from_config() {
		let config: toml::Value =
			toml::from_str("storage_path = \"/tmp/x\"\nttl_drafts = 604800").unwrap();
		let ttl = TtlConfig::from_config(&config);
		assert_eq!(
			ttl.get_ttl(StorageKey::Drafts),
			Duration::from_secs(604800)
		);
		assert_eq!(ttl.get_ttl(StorageKey::Snapshots), Duration::ZERO);

		let storage = FileStorage::new(PathBuf::from("/tmp/x"), ttl);
		assert_eq!(
			storage.get_ttl_for_key("drafts:ORD-20261018-7K3QZ9"),
			Duration::from_secs(604800)
		);
		assert_eq!(storage.get_ttl_for_key("unknown:key"), Duration::ZERO);
	}

	#[test]
	fn test_schema_rejects_negative_ttl() {
		let config: toml::Value = toml::from_str("ttl_drafts = -5").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}

	#[test]
	fn test_schema_rejects_misspelled_ttl() {
		let config: toml::Value = toml::from_str("ttl_draft = 60").unwrap();
		let error = FileStorageSchema.validate(&config).unwrap_err();
		assert!(error.to_string().contains("ttl_draft"));
	}
}
