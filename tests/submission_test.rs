//! Submission against in-memory collaborators: partial failures, section
//! creation for new lines, bounded fan-out and domain events.

mod common;

use dispatch_engine::{
    errors::ServiceError,
    events::{process_events, Event, EventSender},
    models::{LineId, WorkflowStage},
    services::{
        load_pending_groups, submit_session, AllocationSession, InMemorySink, InMemorySource,
        SessionEvent, SessionOptions, SubmitOptions, SyntheticLineDraft,
    },
};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

fn approved_session() -> AllocationSession {
    let mut session = common::session("DO-5");
    for (line_id, qty) in [("L-1", dec!(80)), ("L-2", dec!(40)), ("L-3", dec!(20))] {
        session
            .apply_all(common::approve(line_id, qty, dec!(1600)))
            .unwrap();
    }
    session
}

#[tokio::test]
async fn test_submits_every_eligible_line_in_order() {
    let session = approved_session();
    let sink = InMemorySink::new();

    let report = submit_session(&session, &sink, &SubmitOptions::default())
        .await
        .unwrap();

    assert!(report.is_complete_success());
    assert_eq!(
        report.succeeded,
        vec![LineId::new("L-1"), LineId::new("L-2"), LineId::new("L-3")]
    );
    let lines = sink.submitted_lines().await;
    let orders: Vec<_> = lines.iter().map(|l| l.order_number.as_str()).collect();
    assert_eq!(orders, vec!["DO-5A", "DO-5B", "DO-5A"]);
    assert_eq!(lines[0].rate_floor, dec!(1450.50));
    assert!(sink.created_sections().await.is_empty());
}

#[tokio::test]
async fn test_failed_line_does_not_roll_back_others() {
    let session = approved_session();
    let sink = InMemorySink::new().failing_line(LineId::new("L-2"));

    let report = submit_session(&session, &sink, &SubmitOptions::default())
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec![LineId::new("L-1"), LineId::new("L-3")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].line_id, LineId::new("L-2"));
    assert_eq!(report.summary(), "1 failed, check details");
    assert_eq!(sink.submitted_lines().await.len(), 2);
}

#[tokio::test]
async fn test_new_line_creates_section_before_line() {
    let mut session = approved_session();
    let extra = session
        .apply(SessionEvent::AddSyntheticLine(SyntheticLineDraft {
            template_line: "L-2".into(),
            product_name: "Palm Olein 5L jar".into(),
            sku_name: Some("PO-5L".into()),
            category: None,
            unit_floor_rate: dec!(1500),
        }))
        .unwrap()
        .line_id;
    session
        .apply_all(vec![
            SessionEvent::SetApprovedQty {
                line_id: extra.clone(),
                qty: dec!(25),
            },
            SessionEvent::SetFinalRate {
                line_id: extra.clone(),
                rate: Some(dec!(1550)),
            },
        ])
        .unwrap();

    let sink = InMemorySink::new();
    let report = submit_session(&session, &sink, &SubmitOptions::default())
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 4);

    let sections = sink.created_sections().await;
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].order_number, "DO-5C");
    assert_eq!(sections[0].source_order_number, "DO-5B");
    assert_eq!(sections[0].customer_name, "Amar Oils");
    assert_eq!(sections[0].metadata.transport_type, "Tanker");

    let line = sink
        .submitted_lines()
        .await
        .into_iter()
        .find(|l| l.line_id == extra)
        .unwrap();
    assert_eq!(line.order_number, "DO-5C");
    assert_eq!(line.sku_name, "PO-5L");
}

#[tokio::test]
async fn test_failed_section_fails_its_line() {
    let mut session = approved_session();
    let extra = session
        .apply(SessionEvent::AddSyntheticLine(SyntheticLineDraft {
            template_line: "L-1".into(),
            product_name: "Soya 1L".into(),
            sku_name: None,
            category: None,
            unit_floor_rate: dec!(0),
        }))
        .unwrap()
        .line_id;
    session
        .apply_all(vec![
            SessionEvent::SetApprovedQty {
                line_id: extra.clone(),
                qty: dec!(10),
            },
            SessionEvent::SetFinalRate {
                line_id: extra.clone(),
                rate: Some(dec!(1200)),
            },
        ])
        .unwrap();

    let sink = InMemorySink::new().failing_section("DO-5C");
    let report = submit_session(&session, &sink, &SubmitOptions::default())
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].line_id, extra);
    assert!(report.failed[0].reason.contains("DO-5C"));
    assert_eq!(report.succeeded.len(), 3);
    assert!(sink
        .submitted_lines()
        .await
        .iter()
        .all(|l| l.line_id != extra));
}

#[tokio::test]
async fn test_bounded_fan_out_reports_in_line_order() {
    let session = approved_session();
    let sink = InMemorySink::new().failing_line(LineId::new("L-1"));
    let options = SubmitOptions {
        concurrency: 3,
        events: None,
    };

    let report = submit_session(&session, &sink, &options).await.unwrap();
    assert_eq!(report.succeeded, vec![LineId::new("L-2"), LineId::new("L-3")]);
    assert_eq!(report.failed[0].line_id, LineId::new("L-1"));
}

#[tokio::test]
async fn test_refuses_when_nothing_is_eligible() {
    let session = common::session("DO-5");
    let sink = InMemorySink::new();
    let err = submit_session(&session, &sink, &SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn test_publishes_events() {
    let session = approved_session();
    let sink = InMemorySink::new().failing_line(LineId::new("L-3"));
    let (tx, mut rx) = mpsc::channel(16);
    let options = SubmitOptions {
        concurrency: 1,
        events: Some(EventSender::new(tx)),
    };

    submit_session(&session, &sink, &options).await.unwrap();
    drop(options);

    let mut submitted = 0;
    let mut failed = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            Event::AllocationSubmitted { .. } => submitted += 1,
            Event::SubmissionFailed { line_id, .. } => failed.push(line_id),
            Event::SectionCreated { .. } => {}
        }
    }
    assert_eq!(submitted, 2);
    assert_eq!(failed, vec![LineId::new("L-3")]);
}

#[tokio::test]
async fn test_event_loop_counts_submission_events() {
    let session = approved_session();
    let sink = InMemorySink::new();
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(process_events(rx));

    let options = SubmitOptions {
        concurrency: 2,
        events: Some(EventSender::new(tx)),
    };
    submit_session(&session, &sink, &options).await.unwrap();
    drop(options);

    assert_eq!(handle.await.unwrap(), 3);
}

#[tokio::test]
async fn test_source_to_submission_pipeline() {
    let source = InMemorySource::new().with_records(WorkflowStage::Approval, common::pending_records());
    let grouping =
        load_pending_groups(&source, WorkflowStage::Approval, &common::normalizer()).await;
    let group = grouping.base_orders().find(|g| g.base_order.as_str() == "DO-7").cloned().unwrap();

    let mut session = AllocationSession::new(group, SessionOptions::default());
    session
        .apply_all(common::approve("L-4", dec!(1200), dec!(1650)))
        .unwrap();

    let sink = InMemorySink::new();
    let report = submit_session(&session, &sink, &SubmitOptions::default())
        .await
        .unwrap();
    assert_eq!(report.succeeded, vec![LineId::new("L-4")]);
}

#[tokio::test]
async fn test_unavailable_source_yields_nothing_to_allocate() {
    let grouping = load_pending_groups(
        &InMemorySource::unavailable(),
        WorkflowStage::Approval,
        &common::normalizer(),
    )
    .await;
    assert!(grouping.is_empty());
}
