use std::{fmt, io::BufReader, path::Path, str::FromStr};

use anyhow::{anyhow, bail, Context, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShiftId(pub String);

impl ShiftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShiftId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ShiftId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Available,
    Reserved,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Available => "available",
            ShiftStatus::Reserved => "reserved",
            ShiftStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftStatus {
    type Err = Error;

    fn from_str(status: &str) -> Result<Self, Self::Err> {
        match status {
            "available" => Ok(ShiftStatus::Available),
            "reserved" => Ok(ShiftStatus::Reserved),
            "cancelled" => Ok(ShiftStatus::Cancelled),
            other => Err(anyhow!("unknown shift status: {other:?}")),
        }
    }
}

/// A `shifts/{id}` document exactly as the document store holds it.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RawShiftDocument {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    pub status: String,
    #[serde(
        rename = "reservedBy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reserved_by: Option<String>,
}

/// A `users/{id}` document.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUserDocument {
    #[serde(rename = "firstName", default)]
    pub first_name: String,
    #[serde(rename = "lastName", default)]
    pub last_name: String,
}

/// A validated shift. `reserved_by` is `Some` exactly when `status` is
/// [`ShiftStatus::Reserved`]; the store only changes it through
/// [`Shift::mark_reserved`] and [`Shift::mark_cancelled`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shift {
    pub id: ShiftId,
    pub start_time: DateTime<Utc>,
    pub day: Option<String>,
    pub status: ShiftStatus,
    pub reserved_by: Option<UserId>,
}

impl Shift {
    pub fn available(id: impl Into<ShiftId>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            day: None,
            status: ShiftStatus::Available,
            reserved_by: None,
        }
    }

    pub fn with_day(mut self, day: impl Into<String>) -> Self {
        self.day = Some(day.into());
        self
    }

    pub fn is_reserved_by(&self, user_id: &UserId) -> bool {
        self.status == ShiftStatus::Reserved && self.reserved_by.as_ref() == Some(user_id)
    }

    pub fn mark_reserved(&mut self, by_user: &UserId) {
        self.status = ShiftStatus::Reserved;
        self.reserved_by = Some(by_user.clone());
    }

    /// Returns `false` when the shift was already cancelled.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.status == ShiftStatus::Cancelled {
            return false;
        }
        self.status = ShiftStatus::Cancelled;
        self.reserved_by = None;
        true
    }
}

pub fn validate_shift(id: &str, shift: &RawShiftDocument) -> Result<Shift, Error> {
    let start_time = DateTime::parse_from_rfc3339(&shift.date)
        .with_context(|| format!("date of shift {id} was not rfc3339 compliant: {shift:?}"))?
        .into();
    let status: ShiftStatus = shift
        .status
        .parse()
        .with_context(|| format!("shift {id} has an invalid status"))?;

    match (status, &shift.reserved_by) {
        (ShiftStatus::Reserved, None) => bail!("shift {id} is reserved but names no reservedBy"),
        (ShiftStatus::Available | ShiftStatus::Cancelled, Some(user)) => {
            bail!("shift {id} is {status} but reservedBy is set to {user}")
        }
        _ => {}
    }

    Ok(Shift {
        id: ShiftId::new(id),
        start_time,
        day: shift.day.clone().filter(|day| !day.trim().is_empty()),
        status,
        reserved_by: shift.reserved_by.clone().map(UserId::new),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl UserProfile {
    /// Stand-in used when the profile document is missing or unreadable.
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    pub fn from_document(id: UserId, document: RawUserDocument) -> Self {
        Self {
            id,
            first_name: document.first_name,
            last_name: document.last_name,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShiftEntry {
    pub id: String,
    #[serde(flatten)]
    pub document: RawShiftDocument,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub id: String,
    #[serde(flatten)]
    pub document: RawUserDocument,
}

/// Seed contents for a store: both collections, shifts in listed order.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ShiftDataset {
    #[serde(default)]
    pub shifts: Vec<ShiftEntry>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl ShiftDataset {
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.to_string_lossy()))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("{} is not a valid shift dataset", path.to_string_lossy()))
    }

    pub fn validated_shifts(&self) -> Result<Vec<Shift>, Error> {
        self.shifts
            .iter()
            .map(|entry| validate_shift(&entry.id, &entry.document))
            .collect()
    }

    pub fn profiles(&self) -> Vec<UserProfile> {
        self.users
            .iter()
            .map(|entry| UserProfile::from_document(UserId::new(&entry.id), entry.document.clone()))
            .collect()
    }
}
