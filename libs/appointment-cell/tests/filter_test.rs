use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentFilterCriteria, AppointmentStatus, PhysicianRoster, Priority,
};
use appointment_cell::services::filter::apply_filters;

fn appointment(patient: &str, physician: &str, day: u32, status: AppointmentStatus) -> Appointment {
    let created = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.to_string(),
        physician_id: physician.to_string(),
        date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        status,
        reason: None,
        priority: Priority::Normal,
        notes: None,
        cancellation_reason: None,
        cancellation_details: None,
        cancelled_by: None,
        cancelled_at: None,
        created_at: created,
        updated_at: created,
    }
}

fn sample() -> Vec<Appointment> {
    vec![
        appointment("pat-1", "P1", 3, AppointmentStatus::Scheduled),
        appointment("pat-2", "P2", 5, AppointmentStatus::Confirmed),
        appointment("pat-1", "P2", 9, AppointmentStatus::Cancelled),
        appointment("pat-3", "P3", 12, AppointmentStatus::Scheduled),
        appointment("pat-2", "P1", 20, AppointmentStatus::Completed),
    ]
}

fn roster() -> PhysicianRoster {
    [("P1", "Cardiology"), ("P2", "Dermatology"), ("P3", "cardiology")]
        .into_iter()
        .collect()
}

fn ids(appointments: &[Appointment]) -> Vec<Uuid> {
    appointments.iter().map(|a| a.id).collect()
}

#[test]
fn test_empty_criteria_is_identity() {
    let appointments = sample();
    let criteria = AppointmentFilterCriteria::default();

    assert!(criteria.is_empty());
    assert_eq!(apply_filters(&appointments, &criteria, None), appointments);
}

#[test]
fn test_every_present_criterion_must_match() {
    let appointments = sample();
    let criteria = AppointmentFilterCriteria {
        patient_id: Some("pat-1".to_string()),
        physician_id: Some("P2".to_string()),
        ..AppointmentFilterCriteria::default()
    };

    let filtered = apply_filters(&appointments, &criteria, None);
    assert_eq!(ids(&filtered), vec![appointments[2].id]);
}

#[test]
fn test_date_range_is_inclusive() {
    let appointments = sample();
    let criteria = AppointmentFilterCriteria {
        date_from: NaiveDate::from_ymd_opt(2025, 7, 5),
        date_to: NaiveDate::from_ymd_opt(2025, 7, 12),
        ..AppointmentFilterCriteria::default()
    };

    let filtered = apply_filters(&appointments, &criteria, None);
    assert_eq!(ids(&filtered), vec![appointments[1].id, appointments[2].id, appointments[3].id]);
}

#[test]
fn test_inverted_date_range_matches_nothing() {
    let criteria = AppointmentFilterCriteria {
        date_from: NaiveDate::from_ymd_opt(2025, 7, 20),
        date_to: NaiveDate::from_ymd_opt(2025, 7, 1),
        ..AppointmentFilterCriteria::default()
    };

    assert!(apply_filters(&sample(), &criteria, None).is_empty());
}

#[test]
fn test_specialty_goes_through_roster() {
    let appointments = sample();
    let criteria = AppointmentFilterCriteria {
        specialty: Some("Cardiology".to_string()),
        ..AppointmentFilterCriteria::default()
    };

    assert!(criteria.needs_roster());
    let filtered = apply_filters(&appointments, &criteria, Some(&roster()));
    assert_eq!(
        ids(&filtered),
        vec![appointments[0].id, appointments[3].id, appointments[4].id]
    );

    // Without a roster no physician can be matched to a specialty
    assert!(apply_filters(&appointments, &criteria, None).is_empty());
}

#[test]
fn test_physician_missing_from_roster_never_matches_specialty() {
    let appointments = vec![appointment("pat-9", "P-unknown", 4, AppointmentStatus::Scheduled)];
    let criteria = AppointmentFilterCriteria {
        specialty: Some("Cardiology".to_string()),
        ..AppointmentFilterCriteria::default()
    };

    assert!(apply_filters(&appointments, &criteria, Some(&roster())).is_empty());
}

#[test]
fn test_filtering_is_commutative_and_order_preserving() {
    let appointments = sample();
    let by_status = AppointmentFilterCriteria {
        status: Some(AppointmentStatus::Scheduled),
        ..AppointmentFilterCriteria::default()
    };
    let by_specialty = AppointmentFilterCriteria {
        specialty: Some("cardiology".to_string()),
        ..AppointmentFilterCriteria::default()
    };
    let combined = AppointmentFilterCriteria {
        status: Some(AppointmentStatus::Scheduled),
        specialty: Some("cardiology".to_string()),
        ..AppointmentFilterCriteria::default()
    };
    let roster = roster();

    let status_then_specialty = apply_filters(
        &apply_filters(&appointments, &by_status, Some(&roster)),
        &by_specialty,
        Some(&roster),
    );
    let specialty_then_status = apply_filters(
        &apply_filters(&appointments, &by_specialty, Some(&roster)),
        &by_status,
        Some(&roster),
    );
    let at_once = apply_filters(&appointments, &combined, Some(&roster));

    assert_eq!(status_then_specialty, specialty_then_status);
    assert_eq!(status_then_specialty, at_once);
    assert_eq!(ids(&at_once), vec![appointments[0].id, appointments[3].id]);
}

#[test]
fn test_criteria_deserialize_from_query_shape() {
    let criteria: AppointmentFilterCriteria = serde_json::from_value(serde_json::json!({
        "status": "no_show",
        "date_from": "2025-07-01"
    }))
    .unwrap();

    assert_eq!(criteria.status, Some(AppointmentStatus::NoShow));
    assert_eq!(criteria.date_from, NaiveDate::from_ymd_opt(2025, 7, 1));
    assert!(!criteria.needs_roster());
}
