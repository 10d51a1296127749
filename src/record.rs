//! Breach record model shared by the provider client, store and exporter.
//!
//! Every multi-valued field is an ordered `Vec<String>`. The provider has
//! shipped both scalar and array shapes for the same field over time, so
//! decoding accepts either; encoding writes a single value as a plain
//! scalar and longer lists as sequences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// One breach entry returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "result")]
pub struct Record {
    /// Provider-assigned identifier, used as the local dedup key.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub email: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub ip_address: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub username: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub password: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub hashed_password: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub hash_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub name: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub vin: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub license_plate: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub url: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub social: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub cryptocurrency_address: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub address: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub phone: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "string_list")]
    pub company: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub database_name: String,
}

impl Record {
    /// Creates an empty record with the given identifier.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns the values stored for a field.
    ///
    /// Scalar fields yield zero or one value.
    #[must_use]
    pub fn values(&self, field: RecordField) -> Vec<&str> {
        match field.list(self) {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => {
                let scalar = field.scalar(self).unwrap_or_default();
                if scalar.is_empty() {
                    Vec::new()
                } else {
                    vec![scalar]
                }
            }
        }
    }

    /// First non-blank password, if any.
    #[must_use]
    pub fn first_password(&self) -> Option<&str> {
        first_non_empty(&self.password)
    }

    /// First non-blank username, if any.
    #[must_use]
    pub fn first_username(&self) -> Option<&str> {
        first_non_empty(&self.username)
    }

    /// First non-blank email, if any.
    #[must_use]
    pub fn first_email(&self) -> Option<&str> {
        first_non_empty(&self.email)
    }
}

fn first_non_empty(values: &[String]) -> Option<&str> {
    values
        .iter()
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

/// A column of the record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Email,
    IpAddress,
    Username,
    Password,
    HashedPassword,
    HashType,
    Name,
    Vin,
    LicensePlate,
    Url,
    Social,
    CryptocurrencyAddress,
    Address,
    Phone,
    Company,
    DatabaseName,
}

impl RecordField {
    /// Every field in export order.
    pub const ALL: [Self; 16] = [
        Self::Email,
        Self::IpAddress,
        Self::Username,
        Self::Password,
        Self::HashedPassword,
        Self::HashType,
        Self::Name,
        Self::Vin,
        Self::LicensePlate,
        Self::Url,
        Self::Social,
        Self::CryptocurrencyAddress,
        Self::Address,
        Self::Phone,
        Self::Company,
        Self::DatabaseName,
    ];

    /// Column name in the `results` table.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::IpAddress => "ip_address",
            Self::Username => "username",
            Self::Password => "password",
            Self::HashedPassword => "hashed_password",
            Self::HashType => "hash_type",
            Self::Name => "name",
            Self::Vin => "vin",
            Self::LicensePlate => "license_plate",
            Self::Url => "url",
            Self::Social => "social",
            Self::CryptocurrencyAddress => "cryptocurrency_address",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Company => "company",
            Self::DatabaseName => "database_name",
        }
    }

    /// Human-readable label used by text output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::IpAddress => "IpAddress",
            Self::Username => "Username",
            Self::Password => "Password",
            Self::HashedPassword => "HashedPassword",
            Self::HashType => "HashType",
            Self::Name => "Name",
            Self::Vin => "Vin",
            Self::LicensePlate => "LicensePlate",
            Self::Url => "Url",
            Self::Social => "Social",
            Self::CryptocurrencyAddress => "CryptoCurrencyAddress",
            Self::Address => "Address",
            Self::Phone => "Phone",
            Self::Company => "Company",
            Self::DatabaseName => "DatabaseName",
        }
    }

    /// Whether the column stores a JSON array.
    #[must_use]
    pub fn is_multi_valued(self) -> bool {
        !matches!(self, Self::HashType | Self::DatabaseName)
    }

    fn list(self, record: &Record) -> Option<&Vec<String>> {
        let list = match self {
            Self::Email => &record.email,
            Self::IpAddress => &record.ip_address,
            Self::Username => &record.username,
            Self::Password => &record.password,
            Self::HashedPassword => &record.hashed_password,
            Self::Name => &record.name,
            Self::Vin => &record.vin,
            Self::LicensePlate => &record.license_plate,
            Self::Url => &record.url,
            Self::Social => &record.social,
            Self::CryptocurrencyAddress => &record.cryptocurrency_address,
            Self::Address => &record.address,
            Self::Phone => &record.phone,
            Self::Company => &record.company,
            Self::HashType | Self::DatabaseName => return None,
        };
        Some(list)
    }

    fn scalar(self, record: &Record) -> Option<&str> {
        match self {
            Self::HashType => Some(&record.hash_type),
            Self::DatabaseName => Some(&record.database_name),
            _ => None,
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl FromStr for RecordField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "ip_address" | "ipaddress" | "ip" => Ok(Self::IpAddress),
            "username" => Ok(Self::Username),
            "password" => Ok(Self::Password),
            "hashed_password" | "hash" => Ok(Self::HashedPassword),
            "hash_type" => Ok(Self::HashType),
            "name" => Ok(Self::Name),
            "vin" => Ok(Self::Vin),
            "license_plate" | "license" => Ok(Self::LicensePlate),
            "url" | "domain" => Ok(Self::Url),
            "social" => Ok(Self::Social),
            "cryptocurrency_address" | "crypto" => Ok(Self::CryptocurrencyAddress),
            "address" => Ok(Self::Address),
            "phone" => Ok(Self::Phone),
            "company" => Ok(Self::Company),
            "database_name" | "database" => Ok(Self::DatabaseName),
            other => Err(format!("unknown record field: {other}")),
        }
    }
}

/// A string that also accepts numbers and booleans on input.
struct LenientString(String);

impl<'de> Deserialize<'de> for LenientString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LenientVisitor;

        impl serde::de::Visitor<'_> for LenientVisitor {
            type Value = LenientString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number or boolean")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(LenientString(v.to_string()))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(LenientString(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(LenientString(v.to_string()))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(LenientString(v.to_string()))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(LenientString(v.to_string()))
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(LenientString(v.to_string()))
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(LenientString(String::new()))
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(LenientString(String::new()))
            }
        }

        deserializer.deserialize_any(LenientVisitor)
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    LenientString::deserialize(deserializer).map(|value| value.0)
}

/// Serde adapter for multi-valued fields (scalar or sequence on input).
mod string_list {
    use std::fmt;

    use serde::de::{SeqAccess, Visitor};
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};

    use super::LenientString;

    pub(super) fn serialize<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        // A lone empty string stays a list; the scalar form reads "" as no value.
        if let [single] = values
            && !single.is_empty()
        {
            return serializer.serialize_str(single);
        }
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        struct ListVisitor;

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = Vec<String>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or a list of strings")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(scalar(v.to_string()))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(scalar(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(vec![v.to_string()])
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(vec![v.to_string()])
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(vec![v.to_string()])
            }

            fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(vec![v.to_string()])
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_any(self)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(value) = seq.next_element::<Option<LenientString>>()? {
                    if let Some(LenientString(value)) = value {
                        values.push(value);
                    }
                }
                Ok(values)
            }
        }

        deserializer.deserialize_any(ListVisitor)
    }

    fn scalar(value: String) -> Vec<String> {
        if value.is_empty() { Vec::new() } else { vec![value] }
    }
}
