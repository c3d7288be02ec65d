use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl OrderStatus {
    /// 只允許 pending → confirmed / canceled
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Pending, OrderStatus::Canceled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Canceled => "canceled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    #[default]
    Food,
    Packages,
}

/// A delivery order as stored in the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Backing-store record id.
    pub id: String,
    /// Courier-side identifier, e.g. `test-restaurace-1-charita13-6.10.2022`.
    pub identifier: String,
    pub donor_id: String,
    pub recipient_id: String,
    pub pickup_from: DateTime<Utc>,
    pub pickup_to: Option<DateTime<Utc>>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub id: String,
    /// Donor asked for the reusable packages to be collected.
    pub package_pickup: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    pub id: String,
    /// Courier branch identifier.
    pub external_id: String,
    pub responsible_person: String,
    pub phone: String,
    pub address: Option<String>,
    pub pickup_from: TimeOfDay,
    pub pickup_to: TimeOfDay,
    pub deliver_from: TimeOfDay,
    pub deliver_to: TimeOfDay,
    pub recipient_ids: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Charity {
    pub id: String,
    pub external_id: String,
    pub responsible_person: String,
    pub phone: String,
    pub address: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourierToken {
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub ext_expires_in: Option<u64>,
    pub access_token: String,
}

impl CourierToken {
    pub fn is_bearer(&self) -> bool {
        self.token_type.eq_ignore_ascii_case("bearer")
    }
}

/// The sweep's "today": local midnight to the next local midnight, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDay {
    pub now: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Order payload sent to the courier.
#[derive(Debug, Clone, PartialEq)]
pub struct CourierOrder {
    pub identifier: String,
    pub branch_identifier: String,
    pub pickup: TimeWindow,
    pub pickup_note: Option<String>,
    pub drop_address: String,
    pub drop: TimeWindow,
    pub drop_note: Option<String>,
    pub customer_name: String,
    pub customer_phone: String,
}

/// Order about to be persisted as pending.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub courier: CourierOrder,
    pub donor_id: String,
    pub recipient_id: String,
    pub kind: OrderKind,
}

/// Time of day as an offset from local midnight.
///
/// Stores accept both seconds since midnight (`50400`) and `"HH:MM"` (`"14:00"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    pub fn from_hm(hours: u32, minutes: u32) -> Self {
        Self(hours * 3600 + minutes * 60)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(seconds) = trimmed.parse::<u32>() {
            return Ok(Self(seconds));
        }

        let (hours, minutes) = trimmed
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{}'", s))?;
        let hours: u32 = hours
            .parse()
            .map_err(|_| format!("invalid hours in '{}'", s))?;
        let minutes: u32 = minutes
            .parse()
            .map_err(|_| format!("invalid minutes in '{}'", s))?;

        if hours > 23 || minutes > 59 {
            return Err(format!("time of day out of range: '{}'", s));
        }
        Ok(Self::from_hm(hours, minutes))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 3600, (self.0 % 3600) / 60)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(seconds) => Ok(TimeOfDay(seconds)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
