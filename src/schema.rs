#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Models of the weekly booking schema.
//!
//! Records mirror the engine's JSON shapes (camelCase fields, RFC 3339
//! timestamps kept as strings).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Models known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    /// A customer's reservation of a weekly slot.
    Booking,
    /// An availability window of a resource.
    Availability,
    /// A recurring slot within the week.
    WeeklySlot,
    /// A bookable resource (room, person, equipment).
    Resource,
    /// A person making bookings.
    Customer,
}

impl Model {
    /// Every model, in schema order.
    pub const ALL: [Model; 5] = [
        Model::Booking,
        Model::Availability,
        Model::WeeklySlot,
        Model::Resource,
        Model::Customer,
    ];

    /// Model name as the engine spells it.
    pub fn name(self) -> &'static str {
        match self {
            Model::Booking => "Booking",
            Model::Availability => "Availability",
            Model::WeeklySlot => "WeeklySlot",
            Model::Resource => "Resource",
            Model::Customer => "Customer",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .into_iter()
            .find(|model| model.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown model '{s}'"))
    }
}

/// Day of the week, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Lifecycle of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Requested, not yet confirmed.
    Pending,
    /// Confirmed by the resource owner.
    Confirmed,
    /// Cancelled by either side.
    Cancelled,
}

/// A customer's reservation of one weekly slot for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub slot_id: String,
    pub customer_id: String,
    /// Monday of the booked week (`YYYY-MM-DD`).
    pub week_start: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: String,
}

/// A recurring window during which a resource can be booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub id: String,
    pub resource_id: String,
    pub weekday: Weekday,
    /// Minutes since midnight.
    pub start_minute: u16,
    /// Minutes since midnight, exclusive.
    pub end_minute: u16,
}

/// A bookable slot carved out of an availability window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySlot {
    pub id: String,
    pub availability_id: String,
    pub weekday: Weekday,
    pub start_minute: u16,
    pub duration_minutes: u16,
    pub capacity: u32,
}

/// Something that can be booked: a room, a person, a piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}
