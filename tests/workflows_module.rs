mod support;

use bigin::gateway::{HttpMethod, HttpResponse};
use bigin::shared::batch::BatchStatus;
use bigin::workflows::assignment::{assign_unassigned, assign_with, AssignmentMode, RoundRobin};
use bigin::workflows::reports::{self, ActivitySections};
use bigin::workflows::stale::{
    auto_advance, create_follow_up_tasks, find_stale, identify_stuck, AdvanceCriteria,
    FOLLOW_UP_SUBJECT,
};
use bigin::CrmError;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use support::{envelope, gateway, path_of, write_ok, written_record, ScriptedTransport};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 20).expect("date")
}

#[test]
fn round_robin_assignment_cycles_through_owners() {
    let transport = ScriptedTransport::new(|request| match request.method {
        HttpMethod::Get => envelope(vec![
            json!({"id": "1", "Stage": "Qualification"}),
            json!({"id": "2", "Stage": "Qualification"}),
            json!({"id": "3", "Stage": "Qualification"}),
        ]),
        _ => write_ok("x"),
    });
    let gateway = gateway(transport.clone());
    let owners = vec!["a@x.com".to_string(), "b@x.com".to_string()];

    let items = assign_unassigned(&gateway, &owners, AssignmentMode::RoundRobin).expect("assign");
    let assigned: Vec<_> = items
        .iter()
        .map(|item| (item.pipeline_id.as_str(), item.details["assigned_to"].clone()))
        .collect();
    assert_eq!(
        assigned,
        vec![
            ("1", json!("a@x.com")),
            ("2", json!("b@x.com")),
            ("3", json!("a@x.com")),
        ]
    );
    assert!(items.iter().all(|item| item.status == BatchStatus::Success));

    let requests = transport.requests();
    assert_eq!(
        requests[0].query_value("criteria"),
        Some("(Owner:equals:${EMPTY})")
    );
    assert_eq!(
        written_record(&requests[2]),
        json!({"Owner": {"email": "b@x.com"}})
    );
}

#[test]
fn assignment_without_owners_makes_no_calls() {
    let transport = ScriptedTransport::new(|_| panic!("no request expected"));
    let gateway = gateway(transport.clone());
    let err = assign_with(&gateway, &[" ".to_string()], &mut RoundRobin::default())
        .expect_err("no owners");
    assert!(matches!(err, CrmError::InvalidArgument(_)));
    assert!(transport.requests().is_empty());
}

#[test]
fn random_assignment_only_uses_listed_owners() {
    let transport = ScriptedTransport::new(|request| match request.method {
        HttpMethod::Get => envelope((0..6).map(|i| json!({"id": i.to_string()})).collect()),
        _ => write_ok("x"),
    });
    let gateway = gateway(transport);
    let owners = vec!["a@x.com".to_string(), "b@x.com".to_string()];
    let items = assign_unassigned(&gateway, &owners, AssignmentMode::Random).expect("assign");
    assert_eq!(items.len(), 6);
    for item in items {
        let owner = item.details["assigned_to"].as_str().expect("owner").to_string();
        assert!(owners.contains(&owner));
    }
}

#[test]
fn stale_pipelines_get_high_priority_follow_up_tasks() {
    let transport = ScriptedTransport::new(|request| match request.method {
        HttpMethod::Get => envelope(vec![
            json!({"id": "old", "Deal_Name": "Acme", "Stage": "Qualification",
                   "Last_Activity_Time": "2026-05-01T09:00:00+00:00"}),
            json!({"id": "fresh", "Stage": "Qualification",
                   "Last_Activity_Time": "2026-05-19T09:00:00+00:00"}),
            json!({"id": "never", "Stage": "Prospecting"}),
            json!({"id": "won", "Stage": "Closed Won",
                   "Last_Activity_Time": "2026-01-01T09:00:00+00:00"}),
        ]),
        _ => write_ok("task"),
    });
    let gateway = gateway(transport.clone());

    let stale = find_stale(&gateway, 7, today()).expect("stale");
    let ids: Vec<_> = stale.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["old", "never"]);

    let items = create_follow_up_tasks(&gateway, &stale, today());
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.status == BatchStatus::Created));

    let posts: Vec<_> = transport
        .requests()
        .into_iter()
        .filter(|request| request.method == HttpMethod::Post)
        .collect();
    assert_eq!(posts.len(), 2);
    let task = written_record(&posts[0]);
    assert_eq!(task["Subject"], json!(format!("{FOLLOW_UP_SUBJECT} - Acme")));
    assert_eq!(task["Priority"], json!("High"));
    assert_eq!(task["Due_Date"], json!("2026-05-21"));
    assert_eq!(task["What_Id"], json!({"id": "old"}));
    assert_eq!(task["$se_module"], json!("Pipelines"));
    assert_eq!(path_of(&posts[0]), "/Tasks");
}

#[test]
fn proposal_window_auto_advance_moves_only_old_proposals() {
    let transport = ScriptedTransport::new(|request| match request.method {
        HttpMethod::Get => envelope(vec![
            json!({"id": "p-old", "Stage": "Proposal/Price Quote",
                   "Modified_Time": "2026-05-01T10:00:00+00:00"}),
            json!({"id": "p-new", "Stage": "Proposal/Price Quote",
                   "Modified_Time": "2026-05-18T10:00:00+00:00"}),
        ]),
        _ => write_ok("p-old"),
    });
    let gateway = gateway(transport.clone());
    let criteria = AdvanceCriteria::parse("proposal-sent-and-7-days").expect("criteria");

    let items = auto_advance(&gateway, &criteria, None, today()).expect("advance");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].pipeline_id, "p-old");
    assert_eq!(items[0].status, BatchStatus::Advanced);
    assert_eq!(items[0].details["to_stage"], json!("Negotiation/Review"));

    let requests = transport.requests();
    assert_eq!(
        requests[0].query_value("criteria"),
        Some("(Stage:equals:Proposal/Price Quote)")
    );
    assert_eq!(written_record(&requests[1]), json!({"Stage": "Negotiation/Review"}));
}

#[test]
fn auto_advance_rejects_unknown_target_before_listing() {
    let transport = ScriptedTransport::new(|_| panic!("no request expected"));
    let gateway = gateway(transport);
    let criteria = AdvanceCriteria::parse("amount-ge-1000").expect("criteria");
    let err = auto_advance(&gateway, &criteria, Some("Signed"), today()).expect_err("bad target");
    assert!(matches!(err, CrmError::InvalidStage { .. }));
}

#[test]
fn stuck_pipelines_carry_a_suggestion() {
    let transport = ScriptedTransport::new(|_| {
        envelope(vec![
            json!({"id": "s1", "Deal_Name": "Slow", "Stage": "Needs Analysis", "Amount": 900,
                   "Owner": {"email": "a@x.com"}, "Modified_Time": "2026-04-01T00:00:00+00:00"}),
            json!({"id": "s2", "Stage": "Needs Analysis", "Modified_Time": "2026-05-19T00:00:00+00:00"}),
        ])
    });
    let gateway = gateway(transport);
    let stuck = identify_stuck(&gateway, 14, today()).expect("stuck");
    assert_eq!(stuck.len(), 1);
    assert_eq!(stuck[0].pipeline_id, "s1");
    assert_eq!(stuck[0].owner.as_deref(), Some("a@x.com"));
    assert_eq!(
        stuck[0].suggestion,
        "Send questionnaire or schedule deep-dive meeting"
    );
}

#[test]
fn forecast_weights_by_probability_and_filters_month() {
    let transport = ScriptedTransport::new(|_| {
        envelope(vec![
            json!({"id": "1", "Stage": "Negotiation/Review", "Amount": 1000, "Closing_Date": "2026-06-15"}),
            json!({"id": "2", "Stage": "Qualification", "Amount": 400, "Probability": 50, "Closing_Date": "2026-06-30"}),
            json!({"id": "3", "Stage": "Qualification", "Closing_Date": "2026-06-01"}),
            json!({"id": "4", "Stage": "Qualification", "Amount": 9999, "Closing_Date": "2026-07-01"}),
        ])
    });
    let gateway = gateway(transport);
    let now = Utc.with_ymd_and_hms(2026, 5, 20, 8, 0, 0).single().expect("now");

    let forecast = reports::forecast(&gateway, Some("2026-06"), now).expect("forecast");
    assert_eq!(forecast.month, "2026-06");
    assert_eq!(forecast.total_pipeline_value, 1400.0);
    assert_eq!(forecast.weighted_forecast, 1000.0);
    assert_eq!(forecast.missing_amount, 1);
    assert_eq!(forecast.by_stage["Qualification"].count, 2);

    let err = reports::forecast(&gateway, Some("June"), now).expect_err("bad month");
    assert!(matches!(err, CrmError::InvalidArgument(_)));
}

#[test]
fn activity_report_defaults_to_every_section() {
    let transport = ScriptedTransport::new(|request| {
        let status = request.query_value("criteria").unwrap_or_default().to_string();
        match path_of(request) {
            "/Calls" => envelope(vec![json!({"id": "c1"}), json!({"id": "c2"})]),
            "/Tasks" if status.contains("Completed") => envelope(vec![json!({"id": "t9"})]),
            "/Tasks" => envelope(vec![json!({"id": "t1"}), json!({"id": "t2"}), json!({"id": "t3"})]),
            "/Events" => HttpResponse::new(204, ""),
            other => panic!("unexpected path {other}"),
        }
    });
    let gateway = gateway(transport);
    let now = Utc.with_ymd_and_hms(2026, 5, 20, 8, 0, 0).single().expect("now");

    let report = reports::activity(&gateway, "me", None, ActivitySections::default(), now)
        .expect("activity");
    assert_eq!(report.activities.calls, 2);
    assert_eq!(report.activities.tasks_open, 3);
    assert_eq!(report.activities.tasks_completed, 1);
    assert_eq!(report.activities.meetings, 0);
    assert!(report.details.contains_key("events"));
}

#[test]
fn day_windows_past_the_calendar_fail_before_listing() {
    let transport = ScriptedTransport::new(|_| envelope(vec![support::pipeline("1", "Qualification")]));
    let gateway = gateway(transport.clone());

    let stale = find_stale(&gateway, u32::MAX, today()).expect_err("stale overflow");
    assert!(matches!(stale, CrmError::InvalidArgument(_)), "{stale}");
    let stuck = identify_stuck(&gateway, 4_000_000_000, today()).expect_err("stuck overflow");
    assert!(matches!(stuck, CrmError::InvalidArgument(_)), "{stuck}");
    let advance = auto_advance(
        &gateway,
        &AdvanceCriteria::ProposalSent { days: u32::MAX },
        None,
        today(),
    )
    .expect_err("advance overflow");
    assert!(matches!(advance, CrmError::InvalidArgument(_)), "{advance}");

    assert!(transport.requests().is_empty());
}

#[test]
fn forecast_exports_stage_rows_and_total_as_csv() {
    let transport = ScriptedTransport::new(|_| {
        envelope(vec![
            json!({"id": "1", "Stage": "Negotiation/Review", "Amount": 1000, "Closing_Date": "2026-06-15"}),
            json!({"id": "2", "Stage": "Qualification", "Amount": 400, "Probability": 50, "Closing_Date": "2026-06-30"}),
            json!({"id": "3", "Stage": "Qualification", "Closing_Date": "2026-06-01"}),
        ])
    });
    let gateway = gateway(transport);
    let now = Utc.with_ymd_and_hms(2026, 5, 20, 8, 0, 0).single().expect("now");
    let forecast = reports::forecast(&gateway, Some("2026-06"), now).expect("forecast");
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("forecast.csv");
    std::fs::write(&path, "stale contents").expect("seed file");

    let rows = reports::export_csv(&forecast, &path).expect("export");
    assert_eq!(rows, 3);
    let written = std::fs::read_to_string(&path).expect("read export");
    assert_eq!(
        written.lines().collect::<Vec<_>>(),
        vec![
            "Stage,Count,Value,Probability,Weighted Value,Missing Amount",
            "Negotiation/Review,1,1000,80,800,0",
            "Qualification,2,400,50,200,1",
            "Total,3,1400,,1000,1",
        ]
    );

    let err = reports::export_csv(&forecast, &temp.path().join("missing/dir/out.csv"))
        .expect_err("missing directory");
    assert!(matches!(err, CrmError::Io { .. }));
}
