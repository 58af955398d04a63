//! The per-owner encrypted data vault.
//!
//! Records live in per-category buckets, each record sealed with the
//! vault's content key. The content key itself is held only in wrapped
//! form, so the serialized vault is safe to persist as-is. Reading or
//! writing requires the owner's secret to unwrap the content key first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use carekey_core::DataCategory;

use crate::crypto::{EncryptionKey, X25519PublicKey, X25519StaticSecret};
use crate::envelope::SealedRecord;
use crate::error::Result;
use crate::keywrap::WrappedKey;

/// A per-owner vault of encrypted health records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataVault {
    /// The content key, wrapped to the owner's public key.
    wrapped_key: WrappedKey,
    /// Sealed records, bucketed by category.
    buckets: BTreeMap<DataCategory, Vec<SealedRecord>>,
}

impl DataVault {
    /// Provision a fresh vault for an owner.
    ///
    /// Generates a random content key and immediately wraps it; the
    /// unwrapped key does not outlive this call.
    pub fn provision(owner_public: &X25519PublicKey) -> Result<Self> {
        let content_key = EncryptionKey::generate();
        let wrapped_key = WrappedKey::wrap(&content_key, owner_public)?;
        Ok(Self {
            wrapped_key,
            buckets: BTreeMap::new(),
        })
    }

    fn content_key(&self, owner_secret: &X25519StaticSecret) -> Result<EncryptionKey> {
        self.wrapped_key.unwrap_key(owner_secret)
    }

    /// Read all records in the given categories, decrypted.
    ///
    /// Categories with no bucket yield an empty list, not an error. The
    /// caller is responsible for scope checks; the vault only decrypts.
    pub fn read_categories(
        &self,
        categories: impl IntoIterator<Item = DataCategory>,
        owner_secret: &X25519StaticSecret,
    ) -> Result<BTreeMap<DataCategory, Vec<Vec<u8>>>> {
        let key = self.content_key(owner_secret)?;
        let mut out = BTreeMap::new();
        for category in categories {
            let records = self
                .buckets
                .get(&category)
                .map(|bucket| {
                    bucket
                        .iter()
                        .map(|sealed| sealed.open(&key))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();
            out.insert(category, records);
        }
        Ok(out)
    }

    /// Replace the bucket for a category with a single sealed record.
    pub fn write_record(
        &mut self,
        category: DataCategory,
        plaintext: &[u8],
        owner_secret: &X25519StaticSecret,
        now_ms: i64,
    ) -> Result<()> {
        let key = self.content_key(owner_secret)?;
        let sealed = SealedRecord::seal(plaintext, &key, now_ms)?;
        self.buckets.insert(category, vec![sealed]);
        Ok(())
    }

    /// Append a sealed record to a category bucket.
    pub fn append_record(
        &mut self,
        category: DataCategory,
        plaintext: &[u8],
        owner_secret: &X25519StaticSecret,
        now_ms: i64,
    ) -> Result<()> {
        let key = self.content_key(owner_secret)?;
        let sealed = SealedRecord::seal(plaintext, &key, now_ms)?;
        self.buckets.entry(category).or_default().push(sealed);
        Ok(())
    }

    /// Number of records in a category bucket.
    pub fn record_count(&self, category: DataCategory) -> usize {
        self.buckets.get(&category).map_or(0, |b| b.len())
    }

    /// Categories that currently hold at least one record.
    pub fn populated_categories(&self) -> Vec<DataCategory> {
        self.buckets
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(category, _)| *category)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> (X25519StaticSecret, X25519PublicKey) {
        let secret = X25519StaticSecret::generate();
        let public = secret.public_key();
        (secret, public)
    }

    #[test]
    fn test_write_then_read() {
        let (secret, public) = owner();
        let mut vault = DataVault::provision(&public).unwrap();

        vault
            .write_record(DataCategory::Vitals, b"hr 62", &secret, 100)
            .unwrap();

        let out = vault
            .read_categories([DataCategory::Vitals], &secret)
            .unwrap();
        assert_eq!(out[&DataCategory::Vitals], vec![b"hr 62".to_vec()]);
    }

    #[test]
    fn test_append_accumulates() {
        let (secret, public) = owner();
        let mut vault = DataVault::provision(&public).unwrap();

        vault
            .append_record(DataCategory::Notes, b"first", &secret, 1)
            .unwrap();
        vault
            .append_record(DataCategory::Notes, b"second", &secret, 2)
            .unwrap();

        assert_eq!(vault.record_count(DataCategory::Notes), 2);
        let out = vault
            .read_categories([DataCategory::Notes], &secret)
            .unwrap();
        assert_eq!(
            out[&DataCategory::Notes],
            vec![b"first".to_vec(), b"second".to_vec()]
        );
    }

    #[test]
    fn test_write_replaces_bucket() {
        let (secret, public) = owner();
        let mut vault = DataVault::provision(&public).unwrap();

        vault
            .append_record(DataCategory::Exams, b"old", &secret, 1)
            .unwrap();
        vault
            .write_record(DataCategory::Exams, b"new", &secret, 2)
            .unwrap();

        let out = vault
            .read_categories([DataCategory::Exams], &secret)
            .unwrap();
        assert_eq!(out[&DataCategory::Exams], vec![b"new".to_vec()]);
    }

    #[test]
    fn test_empty_category_reads_empty() {
        let (secret, public) = owner();
        let vault = DataVault::provision(&public).unwrap();

        let out = vault
            .read_categories([DataCategory::Labs], &secret)
            .unwrap();
        assert!(out[&DataCategory::Labs].is_empty());
    }

    #[test]
    fn test_wrong_secret_cannot_read() {
        let (secret, public) = owner();
        let (wrong_secret, _) = owner();
        let mut vault = DataVault::provision(&public).unwrap();

        vault
            .write_record(DataCategory::Vitals, b"hr 62", &secret, 0)
            .unwrap();

        assert!(vault
            .read_categories([DataCategory::Vitals], &wrong_secret)
            .is_err());
    }

    #[test]
    fn test_vault_survives_serialization() {
        let (secret, public) = owner();
        let mut vault = DataVault::provision(&public).unwrap();
        vault
            .write_record(DataCategory::History, b"appendectomy 2019", &secret, 0)
            .unwrap();

        let mut buf = Vec::new();
        ciborium::into_writer(&vault, &mut buf).unwrap();
        let recovered: DataVault = ciborium::from_reader(&buf[..]).unwrap();

        let out = recovered
            .read_categories([DataCategory::History], &secret)
            .unwrap();
        assert_eq!(out[&DataCategory::History], vec![b"appendectomy 2019".to_vec()]);
    }
}
