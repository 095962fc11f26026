//! In-memory contact collection persisted as one versioned blob.
//!
//! Every mutation validates, applies in memory, then writes the full
//! collection back. A failed write undoes the in-memory change, so the
//! collection always matches what is stored.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::blob::{BlobError, BlobStore};
use crate::contact::{Contact, ContactFields, ContactId, Flag, Stats};
use crate::search;
use crate::validate::{self, ValidationErrors};

/// Key the collection is stored under.
pub const CONTACTS_KEY: &str = "contacts";
/// Current layout of the stored blob.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid contact: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("no contact with id {0}")]
    NotFound(ContactId),
    #[error("contact storage failed")]
    Persistence(#[source] BlobError),
    #[error("failed to encode contacts")]
    Encode(#[source] serde_json::Error),
    #[error("no contact id left above {0}")]
    IdsExhausted(ContactId),
    #[error("stored contacts are unreadable: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    contacts: &'a [Contact],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    contacts: Vec<Contact>,
}

pub struct ContactStore {
    contacts: Vec<Contact>,
    blob: Box<dyn BlobStore>,
}

impl ContactStore {
    /// Restore the collection from `blob`. A missing key yields an empty
    /// store; anything present but unreadable is `Corrupt`.
    pub fn load(blob: Box<dyn BlobStore>) -> StoreResult<Self> {
        let raw = blob.read(CONTACTS_KEY).map_err(StoreError::Persistence)?;

        let contacts = match raw {
            None => {
                debug!("event=store_load status=empty");
                Vec::new()
            }
            Some(raw) => decode(&raw)?,
        };

        info!("event=store_load status=ok count={}", contacts.len());
        Ok(Self { contacts, blob })
    }

    /// Write the whole collection, replacing whatever was stored.
    pub fn persist(&mut self) -> StoreResult<()> {
        let envelope = EnvelopeRef {
            version: SCHEMA_VERSION,
            contacts: &self.contacts,
        };
        let raw = serde_json::to_string(&envelope).map_err(StoreError::Encode)?;
        self.blob.write(CONTACTS_KEY, &raw).map_err(|e| {
            warn!("event=store_persist status=error error={e}");
            StoreError::Persistence(e)
        })?;
        debug!(
            "event=store_persist status=ok count={} bytes={}",
            self.contacts.len(),
            raw.len()
        );
        Ok(())
    }

    pub fn add(&mut self, fields: ContactFields) -> StoreResult<Contact> {
        validate::validate(&fields)?;

        let id = self.next_id()?;
        let contact = Contact::from_fields(id, OffsetDateTime::now_utc(), fields);
        self.contacts.push(contact.clone());

        if let Err(e) = self.persist() {
            self.contacts.pop();
            return Err(e);
        }
        info!("event=contact_add id={id}");
        Ok(contact)
    }

    /// Replace every field except `id` and `created_at`.
    pub fn update(&mut self, id: ContactId, fields: ContactFields) -> StoreResult<Contact> {
        validate::validate(&fields)?;

        let index = self.position(id)?;
        let previous = self.contacts[index].clone();
        self.contacts[index].replace_fields(fields);

        if let Err(e) = self.persist() {
            self.contacts[index] = previous;
            return Err(e);
        }
        info!("event=contact_update id={id}");
        Ok(self.contacts[index].clone())
    }

    pub fn delete(&mut self, id: ContactId) -> StoreResult<Contact> {
        let index = self.position(id)?;
        let removed = self.contacts.remove(index);

        if let Err(e) = self.persist() {
            self.contacts.insert(index, removed);
            return Err(e);
        }
        info!("event=contact_delete id={id}");
        Ok(removed)
    }

    /// Flip `flag` and return its new value.
    pub fn toggle_flag(&mut self, id: ContactId, flag: Flag) -> StoreResult<bool> {
        let index = self.position(id)?;
        let value = {
            let slot = self.contacts[index].flag_mut(flag);
            *slot = !*slot;
            *slot
        };

        if let Err(e) = self.persist() {
            *self.contacts[index].flag_mut(flag) = !value;
            return Err(e);
        }
        info!(
            "event=contact_toggle id={id} flag={} value={value}",
            flag.as_str()
        );
        Ok(value)
    }

    pub fn get(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[Contact] {
        &self.contacts
    }

    /// Case-insensitive match on name and email, exact match on phone.
    /// A blank term returns everything.
    pub fn by_substring(&self, term: &str) -> Vec<&Contact> {
        let Some(folded) = search::normalize_query(term) else {
            return self.contacts.iter().collect();
        };
        let phone_term = search::phone_term(term);

        self.contacts
            .iter()
            .filter(|c| {
                search::normalize(&c.name).contains(&folded)
                    || c.phone.contains(phone_term)
                    || c
                        .email
                        .as_deref()
                        .is_some_and(|email| search::normalize(email).contains(&folded))
            })
            .collect()
    }

    pub fn by_flag(&self, flag: Flag) -> Vec<&Contact> {
        self.contacts.iter().filter(|c| c.flag(flag)).collect()
    }

    pub fn stats(&self) -> Stats {
        self.contacts.iter().fold(
            Stats {
                total: self.contacts.len(),
                ..Stats::default()
            },
            |mut stats, c| {
                if c.favorite {
                    stats.favorite_count += 1;
                }
                if c.emergency {
                    stats.emergency_count += 1;
                }
                stats
            },
        )
    }

    fn position(&self, id: ContactId) -> StoreResult<usize> {
        self.contacts
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Current unix millis, bumped past the largest id already in use.
    fn next_id(&self) -> StoreResult<ContactId> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let floor = match self.contacts.iter().map(|c| c.id).max() {
            None => 0,
            Some(max) => max.0.checked_add(1).ok_or(StoreError::IdsExhausted(max))?,
        };
        Ok(ContactId(now.max(floor)))
    }
}

fn decode(raw: &str) -> StoreResult<Vec<Contact>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| StoreError::Corrupt(format!("invalid JSON: {e}")))?;

    let contacts = match value {
        // Unversioned layout: a bare array of contacts.
        Value::Array(_) => {
            let contacts: Vec<Contact> = serde_json::from_value(value)
                .map_err(|e| StoreError::Corrupt(format!("invalid contact record: {e}")))?;
            info!(
                "event=store_migrate from=0 to={SCHEMA_VERSION} count={}",
                contacts.len()
            );
            contacts
        }
        Value::Object(_) => {
            let envelope: Envelope = serde_json::from_value(value)
                .map_err(|e| StoreError::Corrupt(format!("invalid contact record: {e}")))?;
            if envelope.version > SCHEMA_VERSION {
                return Err(StoreError::Corrupt(format!(
                    "unsupported schema version {} (newest known is {SCHEMA_VERSION})",
                    envelope.version
                )));
            }
            envelope.contacts
        }
        other => {
            return Err(StoreError::Corrupt(format!(
                "expected an array or object, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut seen = HashSet::new();
    for contact in &contacts {
        if !seen.insert(contact.id) {
            return Err(StoreError::Corrupt(format!(
                "duplicate contact id {}",
                contact.id
            )));
        }
    }

    Ok(contacts)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
