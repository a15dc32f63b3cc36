//! Backend client and session persistence against a stub backend

mod helpers;

use helpers::spawn_backend;
use ipqc_cli::{AuditClient, ClientError, Opened, SaveOutcome, SessionSync};
use ipqc_common::merge::update;
use ipqc_common::record::BasicField;
use ipqc_common::session::{LeaveDecision, Page, Session};
use ipqc_common::{AuditRecord, ProductionLine, StageConfigRegistry};
use std::time::Duration;

fn client(base_url: &str) -> AuditClient {
    AuditClient::new(base_url, Duration::from_secs(5)).unwrap()
}

fn record(line: ProductionLine, shift: &str) -> AuditRecord {
    let mut record =
        AuditRecord::for_line(StageConfigRegistry::builtin(), line, "2026-10-16", shift);
    record.production_order_no = "PO-1187".into();
    record.module_type = "M10-144HC".into();
    record
}

#[tokio::test]
async fn test_create_fetch_update_delete() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);

    let mut rec = record(ProductionLine::I, "A");
    let stored = client.create(&rec).await.unwrap();
    assert_eq!(stored.name, "IPQC Audit - Line I / 2026-10-16 / Shift A");

    // Renderers are not persisted, so compare the stored form
    let fetched = client.fetch(&stored.id).await.unwrap();
    assert_eq!(
        serde_json::to_value(fetched.data.unwrap()).unwrap(),
        serde_json::to_value(&rec).unwrap()
    );

    rec = update(&rec, 1, "1-1", "4hrs", "24".into());
    client.update(&stored.id, &rec).await.unwrap();
    let fetched = client.fetch(&stored.id).await.unwrap();
    assert_eq!(
        fetched.data.unwrap().observation(1, "1-1", "4hrs").unwrap().as_leaf(),
        Some("24")
    );

    let listed = client.list(false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].data.is_none());
    assert!(client.list(true).await.unwrap()[0].data.is_some());

    client.delete(&stored.id).await.unwrap();
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_api_errors_carry_status_and_body() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);

    match client.fetch("missing").await {
        Err(ClientError::Api { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("missing"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_network_failure() {
    // Nothing listens on the discard port
    let client = client("http://127.0.0.1:9");
    assert!(matches!(client.list(false).await, Err(ClientError::Network(_))));
}

#[tokio::test]
async fn test_save_creates_then_updates_by_identity() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);

    let rec = record(ProductionLine::II, "B");
    let first = client.save(&rec).await.unwrap();
    assert!(matches!(first, SaveOutcome::Created(_)));

    let rec = update(&rec, 2, "2-3", "Line-3", "OK".into());
    let second = client.save(&rec).await.unwrap();
    assert_eq!(second, SaveOutcome::Updated(first.id().to_string()));
    assert_eq!(backend.count(), 1);

    // Different shift is a different checksheet
    client.save(&record(ProductionLine::II, "C")).await.unwrap();
    assert_eq!(backend.count(), 2);
}

#[tokio::test]
async fn test_parallel_saves_of_one_checksheet_create_once() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);
    let rec = record(ProductionLine::I, "A");

    let (a, b) = tokio::join!(client.save(&rec), client.save(&rec));
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, SaveOutcome::Created(_)))
            .count(),
        1
    );
    assert_eq!(backend.count(), 1);
}

#[tokio::test]
async fn test_save_requires_identity() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);
    assert!(matches!(
        client.save(&AuditRecord::default()).await,
        Err(ClientError::MissingIdentity)
    ));
}

#[tokio::test]
async fn test_reports() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);

    let rec = record(ProductionLine::I, "A");
    assert_eq!(client.generate_report(&rec).await.unwrap(), b"PK-report:inline");
    assert_eq!(
        client.generate_report_for("17").await.unwrap(),
        b"PK-report:17"
    );
}

#[tokio::test]
async fn test_session_flow_resumes_existing_checksheet() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);
    let sync = SessionSync::new(&client);
    let registry = StageConfigRegistry::builtin();

    let fill = |session: &mut Session<'_>| {
        session.set_basic_field(BasicField::LineNumber, "II").unwrap();
        session.set_basic_field(BasicField::Date, "2026-10-16").unwrap();
        session.set_basic_field(BasicField::Shift, "A").unwrap();
        session.set_basic_field(BasicField::ProductionOrderNo, "PO-1187").unwrap();
        session.set_basic_field(BasicField::ModuleType, "M10-144HC").unwrap();
    };

    // First operator starts the checksheet and records one stage
    let mut session = Session::new(registry);
    fill(&mut session);
    let id = match sync.resume_or_start(&mut session).await.unwrap() {
        Opened::Started(outcome) => outcome.id().to_string(),
        other => panic!("unexpected: {:?}", other),
    };
    session.open_stage(19).unwrap();
    session.edit_field("19-1", "Line-3", &["Part A"], "10").unwrap();
    session.edit_field("19-1", "Line-3", &["Part B"], "3").unwrap();
    let effect = session.leave_stage(Some(LeaveDecision::SaveChanges)).unwrap().unwrap();
    sync.apply(&mut session, effect).await.unwrap();
    assert!(!session.has_unsaved_changes());

    // Second session for the same line, date and shift picks it up
    let mut again = Session::new(registry);
    fill(&mut again);
    assert_eq!(
        sync.resume_or_start(&mut again).await.unwrap(),
        Opened::Resumed(id.clone())
    );
    assert_eq!(again.page(), Page::StageSelection);
    let mix = again.record().observation(19, "19-1", "Line-3").unwrap();
    assert_eq!(mix.leaf_at(&["Ratio"]), "3.33:1");
    assert_eq!(backend.count(), 1);

    let stored = backend.data(&id).unwrap();
    assert_eq!(stored["lineNumber"], "II");
}

#[tokio::test]
async fn test_unreachable_backend_leaves_session_on_basic_info() {
    // Nothing listens on the discard port
    let client = client("http://127.0.0.1:9");
    let sync = SessionSync::new(&client);

    let mut session = Session::new(StageConfigRegistry::builtin());
    session.set_basic_field(BasicField::LineNumber, "I").unwrap();
    session.set_basic_field(BasicField::Date, "2026-10-16").unwrap();
    session.set_basic_field(BasicField::Shift, "B").unwrap();
    session.set_basic_field(BasicField::ProductionOrderNo, "PO-1187").unwrap();
    session.set_basic_field(BasicField::ModuleType, "M10-144HC").unwrap();
    let before = session.record().clone();

    assert!(sync.resume_or_start(&mut session).await.is_err());
    assert_eq!(session.page(), Page::BasicInfo);
    assert_eq!(session.record(), &before);

    // The operator can still correct basic information
    session.set_basic_field(BasicField::Shift, "C").unwrap();
}

#[tokio::test]
async fn test_failed_save_leaves_session_dirty() {
    let backend = spawn_backend().await;
    let client = client(&backend.base_url);
    let sync = SessionSync::new(&client);

    let mut session = Session::new(StageConfigRegistry::builtin());
    let stored = client.create(&record(ProductionLine::I, "A")).await.unwrap();
    sync.load(&mut session, &stored.id).await.unwrap();

    session.open_stage(1).unwrap();
    session.edit_slot("1-2", "8hrs", "55".into()).unwrap();
    session.save_stage().unwrap();

    client.delete(&stored.id).await.unwrap();
    assert!(sync.save_stored(&mut session, &stored.id).await.is_err());
    assert!(session.has_unsaved_changes());
    assert_eq!(
        session.record().observation(1, "1-2", "8hrs").unwrap().as_leaf(),
        Some("55")
    );
}
