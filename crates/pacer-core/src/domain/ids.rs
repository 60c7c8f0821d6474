//! Domain identifiers (strongly-typed IDs).
//!
//! 外部システムから来る ID（activity id, delivery tag, carrier message id）と
//! こちらで採番する ID（AlertId）を newtype で区別します。
//!
//! - **ActivityId**: 取得元が決める不透明なトークン（比較のみ可能）
//! - **AlertId**: ULID ベース。ブローカーの message_id プロパティとログの突き合わせ用
//! - **DeliveryTag**: ブローカーが配送ごとに振る ack 用ハンドル
//! - **PhoneNumber**: E.164 形式の電話番号
//! - **MessageId**: SMS キャリアが返す送信 ID

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use super::errors::ConfigError;

/// Opaque identifier of an activity, as assigned by the activity source.
///
/// Only equality matters: the poll loop never orders or parses these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(String);

impl ActivityId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ActivityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ActivityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ActivityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an alert, generated when the alert is formatted.
///
/// ULID なので生成順にソート可能。Display は `alert-` プレフィックス付き。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertId(Ulid);

impl AlertId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl From<Ulid> for AlertId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert-{}", self.0)
    }
}

/// Broker-assigned handle for one delivery; only meaningful for `ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryTag(u64);

impl DeliveryTag {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A phone number in E.164 form (`+` followed by 8 to 15 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix('+')
            .ok_or_else(|| ConfigError::InvalidPhoneNumber(raw.to_string()))?;
        let valid_len = (8..=15).contains(&digits.len());
        if !valid_len || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidPhoneNumber(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Carrier-side identifier of a sent text message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_ids_compare_by_token() {
        assert_eq!(ActivityId::from(100), ActivityId::from("100"));
        assert_ne!(ActivityId::from(100), ActivityId::from(250));
    }

    #[test]
    fn alert_ids_are_prefixed_and_sortable() {
        let first = AlertId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = AlertId::generate();

        assert!(first.to_string().starts_with("alert-"));
        assert!(first < second);
    }

    #[test]
    fn phone_numbers_must_be_e164() {
        assert!(PhoneNumber::parse("+15551234567").is_ok());
        assert!(PhoneNumber::parse(" +15551234567 ").is_ok());
        assert!(PhoneNumber::parse("15551234567").is_err());
        assert!(PhoneNumber::parse("+1555-123").is_err());
        assert!(PhoneNumber::parse("+1234").is_err());
    }

    #[test]
    fn phone_numbers_deserialize_through_validation() {
        let ok: PhoneNumber = serde_json::from_str("\"+15551234567\"").unwrap();
        assert_eq!(ok.as_str(), "+15551234567");

        let err = serde_json::from_str::<PhoneNumber>("\"not-a-number\"");
        assert!(err.is_err());
    }
}
