use super::common::*;
use crate::access::Role;
use crate::http::ErrorKind;
use crate::workflows::cases::domain::{
    CaseOutcome, CaseStatus, ClientInfo, LawyerId, OutcomeType, UserId, ViolationType,
};
use crate::workflows::cases::repository::{
    AccountRepository, LawyerRepository, LawyerSearch, RepositoryError,
};
use crate::workflows::cases::service::{
    CaseServiceError, NewCaseRequest, RegisterLawyerRequest, UpdateStatusRequest,
};

fn seeded() -> Harness {
    let h = harness();
    h.accounts
        .insert(account("user-1", Role::User))
        .expect("account inserted");
    h.lawyers
        .insert(wa_lawyer("aaa", "WA-1", vec![ViolationType::Speeding]))
        .expect("lawyer inserted");
    h.accounts
        .insert(account("user-aaa", Role::Lawyer))
        .expect("lawyer account inserted");
    h
}

#[test]
fn quota_gate_rejects_exhausted_accounts() {
    let h = seeded();
    let mut exhausted = account("user-2", Role::User);
    exhausted.quota.cases_used = exhausted.quota.cases_per_month;
    h.accounts.insert(exhausted).expect("account inserted");

    let err = h
        .service
        .submit(&UserId("user-2".to_string()), submission("WA"), fixed_now())
        .expect_err("quota blocks submission");
    assert!(matches!(err, CaseServiceError::QuotaExceeded));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn quota_rolls_over_when_the_reset_date_passes() {
    let h = seeded();
    let mut stale = account("user-2", Role::User);
    stale.quota.cases_used = stale.quota.cases_per_month;
    stale.quota.reset_date = Some(fixed_now() - chrono::Duration::days(1));
    h.accounts.insert(stale).expect("account inserted");

    let case = h
        .service
        .submit(&UserId("user-2".to_string()), submission("WA"), fixed_now())
        .expect("rolled quota admits the case");
    assert_eq!(case.status, CaseStatus::Assigned);

    let refreshed = h
        .accounts
        .fetch(&UserId("user-2".to_string()))
        .expect("fetch succeeds")
        .expect("account present");
    assert_eq!(refreshed.quota.cases_used, 1);
    assert!(refreshed.quota.reset_date.expect("reset advanced") > fixed_now());
}

#[test]
fn speeding_case_without_cdl_quotes_the_standard_fee() {
    let h = seeded();
    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");

    assert_eq!(case.pricing.quoted_cents, 24_900);
    assert_eq!(case.status, CaseStatus::Assigned);
    assert_eq!(case.timeline.len(), 2);
}

#[test]
fn dui_case_quotes_the_premium_even_for_cdl_drivers() {
    let h = seeded();
    let mut request = submission("WA");
    request.ticket.violation_type = ViolationType::Dui;
    request.client = ClientInfo {
        is_cdl_driver: true,
        ..ClientInfo::default()
    };

    let case = h
        .service
        .submit(&UserId("user-1".to_string()), request, fixed_now())
        .expect("submission succeeds");
    assert_eq!(case.pricing.quoted_cents, 49_900);
}

#[test]
fn assigned_lawyer_updates_status_and_outcome_statistics() {
    let h = seeded();
    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");

    let lawyer_actor = actor("user-aaa", Role::Lawyer);
    h.service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::InProgress,
                note: Some("Reviewing evidence".to_string()),
                court_date: None,
                outcome: None,
            },
            &lawyer_actor,
            fixed_now(),
        )
        .expect("assigned lawyer may update");

    let updated = h
        .service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::Dismissed,
                note: Some("Dismissed at hearing".to_string()),
                court_date: None,
                outcome: Some(CaseOutcome {
                    outcome: OutcomeType::Dismissed,
                    final_fine_cents: Some(0),
                    final_points: Some(0),
                    notes: None,
                }),
            },
            &lawyer_actor,
            fixed_now(),
        )
        .expect("outcome recorded");

    assert_eq!(updated.status, CaseStatus::Dismissed);
    let lawyer = h
        .lawyers
        .fetch(&LawyerId("aaa".to_string()))
        .expect("fetch succeeds")
        .expect("lawyer present");
    assert_eq!(lawyer.statistics.total_cases, 11);
    assert_eq!(lawyer.statistics.cases_dismissed, 3);
    assert_eq!(lawyer.statistics.success_rate, 82);
}

#[test]
fn defendants_cannot_update_status() {
    let h = seeded();
    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");

    let err = h
        .service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::InProgress,
                note: None,
                court_date: None,
                outcome: None,
            },
            &actor("user-1", Role::User),
            fixed_now(),
        )
        .expect_err("defendants lack the capability");
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn foreign_lawyers_cannot_touch_someone_elses_docket() {
    let h = seeded();
    h.lawyers
        .insert(wa_lawyer("bbb", "WA-2", vec![ViolationType::Dui]))
        .expect("second lawyer inserted");
    h.accounts
        .insert(account("user-bbb", Role::Lawyer))
        .expect("second lawyer account");

    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");
    assert_eq!(case.lawyer_id, Some(LawyerId("aaa".to_string())));

    let err = h
        .service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::InProgress,
                note: None,
                court_date: None,
                outcome: None,
            },
            &actor("user-bbb", Role::Lawyer),
            fixed_now(),
        )
        .expect_err("not their case");
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn invalid_transitions_fail_validation_without_mutating() {
    let h = seeded();
    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");

    let err = h
        .service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::Closed,
                note: None,
                court_date: None,
                outcome: None,
            },
            &actor("admin-1", Role::Admin),
            fixed_now(),
        )
        .expect_err("assigned cannot jump to closed");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stored = h
        .service
        .get(&case.case_number, &actor("admin-1", Role::Admin))
        .expect("fetch succeeds");
    assert_eq!(stored.status, CaseStatus::Assigned);
    assert_eq!(stored.timeline.len(), 2);
}

#[test]
fn reassignment_swaps_slots_and_keeps_status() {
    let h = seeded();
    let replacement = wa_lawyer("bbb", "WA-2", vec![ViolationType::Speeding]);
    h.lawyers.insert(replacement).expect("lawyer inserted");

    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");
    assert_eq!(case.lawyer_id, Some(LawyerId("aaa".to_string())));

    let reassigned = h
        .service
        .reassign(
            &case.case_number,
            &LawyerId("bbb".to_string()),
            &actor("admin-1", Role::Admin),
            fixed_now(),
        )
        .expect("admin reassigns");

    assert_eq!(reassigned.status, CaseStatus::Assigned);
    assert_eq!(reassigned.lawyer_id, Some(LawyerId("bbb".to_string())));

    let old = h
        .lawyers
        .fetch(&LawyerId("aaa".to_string()))
        .expect("fetch succeeds")
        .expect("profile present");
    let new = h
        .lawyers
        .fetch(&LawyerId("bbb".to_string()))
        .expect("fetch succeeds")
        .expect("profile present");
    assert_eq!(old.availability.current_cases, 0);
    assert_eq!(new.availability.current_cases, 1);
}

#[test]
fn reassignment_requires_the_admin_capability() {
    let h = seeded();
    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");

    let err = h
        .service
        .reassign(
            &case.case_number,
            &LawyerId("aaa".to_string()),
            &actor("user-1", Role::User),
            fixed_now(),
        )
        .expect_err("defendants cannot reassign");
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn rating_is_owner_only_and_single_shot() {
    let h = seeded();
    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");

    let err = h
        .service
        .rate(
            &case.case_number,
            5,
            None,
            &actor("user-2", Role::User),
            fixed_now(),
        )
        .expect_err("only the owner rates");
    assert_eq!(err.kind(), ErrorKind::Authorization);

    h.service
        .rate(
            &case.case_number,
            5,
            Some("Got the ticket dismissed".to_string()),
            &actor("user-1", Role::User),
            fixed_now(),
        )
        .expect("first rating lands");

    let err = h
        .service
        .rate(
            &case.case_number,
            3,
            None,
            &actor("user-1", Role::User),
            fixed_now(),
        )
        .expect_err("second rating conflicts");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let lawyer = h
        .lawyers
        .fetch(&LawyerId("aaa".to_string()))
        .expect("fetch succeeds")
        .expect("lawyer present");
    assert_eq!(lawyer.rating.count, 21);
    let expected = (4.5 * 20.0 + 5.0) / 21.0;
    assert!((lawyer.rating.average - expected).abs() < 1e-9);
}

#[test]
fn lawyer_registration_starts_unapproved_and_license_is_unique() {
    let h = harness();
    let request = RegisterLawyerRequest {
        user_id: UserId("user-9".to_string()),
        license_number: "WA-9001".to_string(),
        bar_association: "WSBA".to_string(),
        years_of_experience: 4,
        specializations: vec![ViolationType::Speeding],
        jurisdictions: vec![],
        bio: None,
        max_cases: None,
        bank_details: None,
    };

    let profile = h
        .service
        .register_lawyer(request.clone())
        .expect("registration succeeds");
    assert!(!profile.is_approved);
    assert_eq!(profile.availability.max_cases, 20);

    let err = h
        .service
        .register_lawyer(request)
        .expect_err("duplicate license rejected");
    assert!(matches!(
        err,
        CaseServiceError::Repository(RepositoryError::Conflict)
    ));
}

#[test]
fn approval_makes_a_lawyer_visible_to_search_and_matching() {
    let h = harness();
    h.accounts
        .insert(account("user-1", Role::User))
        .expect("account inserted");
    let mut unapproved = wa_lawyer("aaa", "WA-1", vec![ViolationType::Speeding]);
    unapproved.is_approved = false;
    h.lawyers.insert(unapproved).expect("lawyer inserted");

    let found = h
        .service
        .search_lawyers(&LawyerSearch {
            state: Some("WA".to_string()),
            specialization: None,
        })
        .expect("search succeeds");
    assert!(found.is_empty());

    let case = h
        .service
        .submit(&UserId("user-1".to_string()), submission("WA"), fixed_now())
        .expect("submission succeeds");
    assert_eq!(case.status, CaseStatus::Pending);

    h.service
        .approve_lawyer(&LawyerId("aaa".to_string()), &actor("admin-1", Role::Admin))
        .expect("approval succeeds");

    let found = h
        .service
        .search_lawyers(&LawyerSearch::default())
        .expect("search succeeds");
    assert_eq!(found.len(), 1);

    let rematched = h
        .service
        .rematch(&case.case_number, fixed_now())
        .expect("rematch succeeds");
    assert_eq!(rematched.status, CaseStatus::Assigned);
}

#[test]
fn new_case_request_deserializes_from_api_payloads() {
    let payload = serde_json::json!({
        "ticket": {
            "violation_type": "speeding",
            "ticket_number": "4A-88213",
            "issue_date": "2025-07-01",
            "location": { "state": "WA", "city": "Seattle" },
            "court": { "name": "Seattle Municipal Court" },
            "fine_cents": 13600,
            "points": 2,
            "ticket_image": "tickets/4a-88213.jpg"
        }
    });

    let request: NewCaseRequest =
        serde_json::from_value(payload).expect("payload deserializes");
    assert_eq!(request.ticket.violation_type, ViolationType::Speeding);
    assert!(!request.client.is_cdl_driver);
}
