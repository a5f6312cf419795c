use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// WEEKLY TEMPLATE
// ==============================================================================

/// Day of week, ordered Sunday = 0 through Saturday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayName {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayName {
    pub const ALL: [DayName; 7] = [
        DayName::Sunday,
        DayName::Monday,
        DayName::Tuesday,
        DayName::Wednesday,
        DayName::Thursday,
        DayName::Friday,
        DayName::Saturday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_sunday() as usize]
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayName::Sunday => "sunday",
            DayName::Monday => "monday",
            DayName::Tuesday => "tuesday",
            DayName::Wednesday => "wednesday",
            DayName::Thursday => "thursday",
            DayName::Friday => "friday",
            DayName::Saturday => "saturday",
        }
    }
}

impl fmt::Display for DayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

impl DaySchedule {
    pub fn open<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: slots.into_iter().map(Into::into).collect(),
            is_available: true,
        }
    }

    pub fn closed() -> Self {
        Self { slots: Vec::new(), is_available: false }
    }

    /// Slots a patient may book on this day. A closed day offers nothing,
    /// whatever its slot list says.
    pub fn bookable_slots(&self) -> &[String] {
        if self.is_available {
            &self.slots
        } else {
            &[]
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklySchedule(pub BTreeMap<DayName, DaySchedule>);

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, day: DayName, schedule: DaySchedule) -> Self {
        self.0.insert(day, schedule);
        self
    }

    pub fn day(&self, day: DayName) -> Option<&DaySchedule> {
        self.0.get(&day)
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.day(DayName::of(date))
    }

    pub fn offers(&self, date: NaiveDate, time_slot: &str) -> bool {
        self.for_date(date)
            .map(|day| day.bookable_slots().iter().any(|slot| slot == time_slot))
            .unwrap_or(false)
    }

    pub fn merge(&mut self, days: BTreeMap<DayName, DaySchedule>) {
        self.0.extend(days);
    }
}

/// Slot labels are "HH:MM" on a 24-hour clock.
pub fn is_valid_slot_label(label: &str) -> bool {
    label.len() == 5 && NaiveTime::parse_from_str(label, "%H:%M").is_ok()
}

// ==============================================================================
// DOCTOR
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub department_id: Option<Uuid>,
    pub name: String,
    pub specialization: String,
    pub consultation_fee: f64,
    #[serde(default)]
    pub schedule: WeeklySchedule,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn new(hospital_id: Uuid, name: &str, specialization: &str, schedule: WeeklySchedule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            hospital_id,
            department_id: None,
            name: name.to_string(),
            specialization: specialization.to_string(),
            consultation_fee: 0.0,
            schedule,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Public projection returned to the mobile client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub name: String,
    pub specialization: String,
    pub consultation_fee: f64,
    pub schedule: WeeklySchedule,
}

impl From<&Doctor> for DoctorProfile {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            hospital_id: doctor.hospital_id,
            name: doctor.name.clone(),
            specialization: doctor.specialization.clone(),
            consultation_fee: doctor.consultation_fee,
            schedule: doctor.schedule.clone(),
        }
    }
}

/// Doctor fields embedded in appointment and prescription responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub consultation_fee: f64,
}

impl From<&Doctor> for DoctorSummary {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name.clone(),
            specialization: doctor.specialization.clone(),
            consultation_fee: doctor.consultation_fee,
        }
    }
}

/// Replaces the listed days; days not mentioned keep their template.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateScheduleRequest {
    pub days: BTreeMap<DayName, DaySchedule>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Data store unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for DoctorError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Unavailable(msg) => DoctorError::ServiceUnavailable(msg),
            other => DoctorError::DatabaseError(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::Forbidden(msg) => AppError::Forbidden(msg),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weekday_mapping_starts_on_sunday() {
        // 2024-06-02 was a Sunday, 2024-06-08 a Saturday.
        let sunday = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        assert_eq!(DayName::of(sunday), DayName::Sunday);
        assert_eq!(DayName::of(sunday).index(), 0);
        assert_eq!(DayName::of(saturday), DayName::Saturday);
        assert_eq!(DayName::of(saturday).index(), 6);
    }

    #[test]
    fn closed_day_offers_nothing_even_with_slots() {
        let day = DaySchedule { slots: vec!["09:00".into()], is_available: false };
        assert!(day.bookable_slots().is_empty());
    }

    #[test]
    fn schedule_round_trips_through_document_shape() {
        let raw = json!({
            "monday": { "slots": ["09:00", "10:00"], "isAvailable": true },
            "sunday": { "slots": [], "isAvailable": false }
        });
        let schedule: WeeklySchedule = serde_json::from_value(raw).unwrap();
        assert_eq!(schedule.day(DayName::Monday).unwrap().slots, vec!["09:00", "10:00"]);
        assert!(!schedule.day(DayName::Sunday).unwrap().is_available);
        assert!(schedule.day(DayName::Tuesday).is_none());
    }

    #[test]
    fn offers_checks_weekday_template() {
        let schedule = WeeklySchedule::new()
            .with_day(DayName::Monday, DaySchedule::open(["09:00"]));
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        assert!(schedule.offers(monday, "09:00"));
        assert!(!schedule.offers(monday, "10:00"));
        assert!(!schedule.offers(tuesday, "09:00"));
    }

    #[test]
    fn slot_labels_are_strict() {
        assert!(is_valid_slot_label("09:00"));
        assert!(is_valid_slot_label("23:30"));
        assert!(!is_valid_slot_label("9:00"));
        assert!(!is_valid_slot_label("24:00"));
        assert!(!is_valid_slot_label("morning"));
    }
}
