use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;

/// Identifier of a contact. Time-based (unix millis) and strictly increasing
/// within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId(pub u64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ContactId)
    }
}

// Stored as a decimal string, the shape older blobs were written with.
impl Serialize for ContactId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ContactId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Number(u64),
            Text(String),
        }

        match Helper::deserialize(deserializer)? {
            Helper::Number(n) => Ok(ContactId(n)),
            Helper::Text(s) => s
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid contact id `{s}`"))),
        }
    }
}

/// Boolean attributes that feed the side lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Favorite,
    Emergency,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Favorite => "favorite",
            Flag::Emergency => "emergency",
        }
    }
}

/// The mutable field set of a contact. `update` overwrites all of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactFields {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub group: Option<String>,
    pub notes: Option<String>,
    pub favorite: bool,
    pub emergency: bool,
    /// Opaque image reference, usually a data URI.
    pub avatar: Option<String>,
}

#[cfg(test)]
impl ContactFields {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub phone: String,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub emergency: bool,
    #[serde(default, deserialize_with = "blank_as_none", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Contact {
    pub(crate) fn from_fields(id: ContactId, created_at: OffsetDateTime, fields: ContactFields) -> Self {
        let mut contact = Self {
            id,
            name: String::new(),
            phone: String::new(),
            email: None,
            address: None,
            group: None,
            notes: None,
            favorite: false,
            emergency: false,
            avatar: None,
            created_at,
        };
        contact.replace_fields(fields);
        contact
    }

    /// Overwrite everything except `id` and `created_at`.
    pub(crate) fn replace_fields(&mut self, fields: ContactFields) {
        let ContactFields {
            name,
            phone,
            email,
            address,
            group,
            notes,
            favorite,
            emergency,
            avatar,
        } = fields;
        self.name = name;
        self.phone = phone;
        self.email = email;
        self.address = address;
        self.group = group;
        self.notes = notes;
        self.favorite = favorite;
        self.emergency = emergency;
        self.avatar = avatar;
    }

    /// Snapshot of the mutable fields, the starting point for an edit.
    pub fn fields(&self) -> ContactFields {
        ContactFields {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            group: self.group.clone(),
            notes: self.notes.clone(),
            favorite: self.favorite,
            emergency: self.emergency,
            avatar: self.avatar.clone(),
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Favorite => self.favorite,
            Flag::Emergency => self.emergency,
        }
    }

    pub(crate) fn flag_mut(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::Favorite => &mut self.favorite,
            Flag::Emergency => &mut self.emergency,
        }
    }
}

/// Counts shown in the header of the contact list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub favorite_count: usize,
    pub emergency_count: usize,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_id_accepts_string_or_number() {
        let from_text: ContactId = serde_json::from_str("\"1700000000000\"").unwrap();
        let from_number: ContactId = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(from_text, ContactId(1_700_000_000_000));
        assert_eq!(from_number, from_text);

        assert!(serde_json::from_str::<ContactId>("\"abc\"").is_err());
        assert_eq!(serde_json::to_string(&ContactId(42)).unwrap(), "\"42\"");
    }

    #[test]
    fn test_contact_serializes_camel_case_and_skips_absent_fields() {
        let created_at = time::macros::datetime!(2024-05-01 10:20:30 UTC);
        let contact = Contact::from_fields(
            ContactId(7),
            created_at,
            ContactFields::new("Jane Doe", "01012345678"),
        );
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["createdAt"], "2024-05-01T10:20:30Z");
        assert!(json.get("email").is_none());
        assert_eq!(json["favorite"], false);
    }

    #[test]
    fn test_blank_optional_strings_become_none() {
        let raw = r#"{
            "id": "1700000000000",
            "name": "Jane Doe",
            "phone": "01012345678",
            "email": "",
            "address": "  ",
            "group": "family",
            "notes": "",
            "favorite": true,
            "emergency": false,
            "avatar": "",
            "createdAt": "2023-11-14T22:13:20.000Z"
        }"#;
        let contact: Contact = serde_json::from_str(raw).unwrap();
        assert_eq!(contact.email, None);
        assert_eq!(contact.address, None);
        assert_eq!(contact.group.as_deref(), Some("family"));
        assert_eq!(contact.avatar, None);
        assert!(contact.favorite);
    }

    #[test]
    fn test_replace_fields_keeps_identity() {
        let created_at = time::macros::datetime!(2024-05-01 10:20:30 UTC);
        let mut contact = Contact::from_fields(
            ContactId(7),
            created_at,
            ContactFields::new("Jane Doe", "01012345678"),
        );
        let mut fields = ContactFields::new("John Roe", "01187654321");
        fields.emergency = true;
        contact.replace_fields(fields.clone());

        assert_eq!(contact.id, ContactId(7));
        assert_eq!(contact.created_at, created_at);
        assert_eq!(contact.fields(), fields);
        assert!(contact.flag(Flag::Emergency));
        assert!(!contact.flag(Flag::Favorite));
    }
}
