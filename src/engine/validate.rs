use chrono::{Datelike, NaiveDate};

use crate::limits::*;
use crate::model::*;

use super::EngineError;

fn in_date_range(date: NaiveDate) -> bool {
    (MIN_DATE_YEAR..=MAX_DATE_YEAR).contains(&date.year())
}

/// A bookable stay: non-empty, within the storable years and no longer than
/// [`MAX_STAY_NIGHTS`].
pub(crate) fn validate_stay(stay: &Stay) -> Result<(), EngineError> {
    if stay.start >= stay.end {
        return Err(EngineError::InvalidInput("stay must end after it starts"));
    }
    if !in_date_range(stay.start) || !in_date_range(stay.end) {
        return Err(EngineError::InvalidInput("stay dates out of range"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// A query window: non-empty, within the storable years and no wider than
/// [`MAX_QUERY_WINDOW_DAYS`].
pub(crate) fn validate_window(window: &Stay) -> Result<(), EngineError> {
    if window.start >= window.end {
        return Err(EngineError::InvalidInput("window must end after it starts"));
    }
    if !in_date_range(window.start) || !in_date_range(window.end) {
        return Err(EngineError::InvalidInput("window dates out of range"));
    }
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

pub(crate) fn validate_room_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidInput("room name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("room name too long"));
    }
    Ok(())
}

/// Lengths only; format checks belong to whoever collects the form.
pub(crate) fn validate_guest(guest: &GuestDetails) -> Result<(), EngineError> {
    let fields = [
        &guest.first_name,
        &guest.last_name,
        &guest.email,
        &guest.phone,
    ];
    if fields.iter().any(|f| f.len() > MAX_CONTACT_FIELD_LEN) {
        return Err(EngineError::LimitExceeded("guest field too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Days;

    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn stay_length_is_capped() {
        let start = d("2025-01-01");
        let ok = Stay::new(start, start + Days::new(MAX_STAY_NIGHTS as u64)).unwrap();
        assert!(validate_stay(&ok).is_ok());

        let long = Stay::new(start, start + Days::new(MAX_STAY_NIGHTS as u64 + 1)).unwrap();
        assert!(matches!(validate_stay(&long), Err(EngineError::LimitExceeded(_))));
    }

    #[test]
    fn hand_built_empty_stay_is_rejected() {
        let empty = Stay {
            start: d("2025-01-05"),
            end: d("2025-01-05"),
        };
        assert!(matches!(validate_stay(&empty), Err(EngineError::InvalidInput(_))));
        assert!(matches!(validate_window(&empty), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn dates_past_year_9999_are_rejected() {
        let last = d("9999-12-31");
        let inside = Stay::new(d("9999-12-30"), last).unwrap();
        assert!(validate_stay(&inside).is_ok());
        assert!(validate_window(&inside).is_ok());

        let across = Stay::new(d("9999-12-30"), last + Days::new(2)).unwrap();
        assert!(matches!(validate_stay(&across), Err(EngineError::InvalidInput(_))));
        assert!(matches!(validate_window(&across), Err(EngineError::InvalidInput(_))));

        let before = NaiveDate::from_ymd_opt(0, 12, 31).unwrap();
        let year_zero = Stay::new(before, d("0001-01-02")).unwrap();
        assert!(validate_stay(&year_zero).is_err());
    }

    #[test]
    fn window_may_exceed_a_stay() {
        let start = d("2025-01-01");
        let wide = Stay::new(start, start + Days::new(MAX_STAY_NIGHTS as u64 * 2)).unwrap();
        assert!(validate_stay(&wide).is_err());
        assert!(validate_window(&wide).is_ok());
    }

    #[test]
    fn room_names() {
        assert!(validate_room_name("Major's Suite").is_ok());
        assert!(matches!(validate_room_name("  "), Err(EngineError::InvalidInput(_))));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(validate_room_name(&long), Err(EngineError::LimitExceeded(_))));
    }

    #[test]
    fn guest_fields_are_length_checked() {
        let mut guest = GuestDetails {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            phone: "555-0100".into(),
        };
        assert!(validate_guest(&guest).is_ok());
        guest.email = "a".repeat(MAX_CONTACT_FIELD_LEN + 1);
        assert!(validate_guest(&guest).is_err());
    }
}
