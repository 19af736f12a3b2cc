use chrono::{Duration, NaiveTime};
use scheduler::{SlotId, TimeSlot};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An enumeration of possible errors that can occur when reading timeslot forms.
///
/// # Variants
/// - `BadStartTime` - The start time is not `HH:MM`
/// - `BadDuration` - The duration is not positive or runs past midnight
#[derive(Debug, thiserror::Error, ToSchema, Serialize)]
pub enum TimeSlotErr {
    #[error("Start time {0} is not HH:MM")]
    BadStartTime(String),
    #[error("Duration of {0} minutes does not fit in the day")]
    BadDuration(i32),
}

/// A time slot as submitted: start time, length in minutes and position.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeslotForm {
    /// `HH:MM`, 24 hour clock
    pub start_time: String,
    /// Minutes
    pub duration: i32,
    pub sort_order: i32,
    #[serde(default)]
    pub is_break: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TimeslotRequest {
    pub timeslots: Vec<TimeslotForm>,
}

impl TimeslotForm {
    /// Converts the form into an unsaved slot. The id is assigned on insert.
    pub fn to_time_slot(&self) -> Result<TimeSlot, TimeSlotErr> {
        let start_time = NaiveTime::parse_from_str(&self.start_time, "%H:%M")
            .map_err(|_| TimeSlotErr::BadStartTime(self.start_time.clone()))?;
        if self.duration <= 0 {
            return Err(TimeSlotErr::BadDuration(self.duration));
        }

        let (end_time, wrapped) = start_time.overflowing_add_signed(Duration::minutes(i64::from(self.duration)));
        if wrapped != 0 {
            return Err(TimeSlotErr::BadDuration(self.duration));
        }

        let slot = TimeSlot::new(SlotId(0), self.sort_order, start_time, end_time);
        Ok(if self.is_break { slot.as_break() } else { slot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(start_time: &str, duration: i32) -> TimeslotForm {
        TimeslotForm {
            start_time: start_time.to_string(),
            duration,
            sort_order: 10,
            is_break: false,
        }
    }

    #[test]
    fn test_form_to_time_slot() {
        let slot = form("10:15", 50).to_time_slot().unwrap();
        assert_eq!(slot.start_time, NaiveTime::from_hms_opt(10, 15, 0).unwrap());
        assert_eq!(slot.end_time, NaiveTime::from_hms_opt(11, 5, 0).unwrap());
        assert!(!slot.is_break);

        let lunch = TimeslotForm {
            is_break: true,
            ..form("12:00", 45)
        };
        assert!(lunch.to_time_slot().unwrap().is_break);
    }

    #[test]
    fn test_bad_forms() {
        assert!(matches!(form("9am", 50).to_time_slot(), Err(TimeSlotErr::BadStartTime(_))));
        assert!(matches!(form("09:00", 0).to_time_slot(), Err(TimeSlotErr::BadDuration(0))));
        assert!(matches!(form("23:30", 45).to_time_slot(), Err(TimeSlotErr::BadDuration(45))));
    }
}
