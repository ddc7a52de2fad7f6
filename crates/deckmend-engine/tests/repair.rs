//! Tests for repair and delete workflows against a mock AnkiConnect.

mod common;

use std::time::Duration;

use common::{
    mock_action, mock_action_times, mock_action_with_params, mock_anki_error,
    mock_anki_response, note_info, setup_mock_server, store_for_mock, store_with_timeout,
};
use deckmend_engine::repair::ContentMatch;
use deckmend_engine::{DefectTag, Note, NoteSchema, Normalizer, RepairEngine, RetryPolicy};

const GOOD: &str =
    "Dopamine is a neurotransmitter that signals reward and helps control voluntary movement.";

#[tokio::test]
async fn test_repair_updates_defective_notes() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![1_i64, 2])).await;
    mock_action(
        &server,
        "notesInfo",
        mock_anki_response(vec![
            note_info(
                1,
                "Basic",
                [("Front", "How do Flow through a Neuron function?"), ("Back", GOOD)],
            ),
            note_info(2, "Basic", [("Front", "What is dopamine?"), ("Back", GOOD)]),
        ]),
    )
    .await;
    // Schema is resolved once per note type, not per note
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Front", "Back"]),
    )
    .await;
    mock_action_with_params(
        &server,
        "updateNoteFields",
        serde_json::json!({
            "note": {
                "id": 1,
                "fields": {"Front": "How does neural transmission work through a neuron?"}
            }
        }),
        mock_anki_response(serde_json::Value::Null),
    )
    .await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .repair("deck:Neuro")
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.repaired, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.by_defect.get(&DefectTag::GrammarDefect), Some(&1));
}

#[tokio::test]
async fn test_repair_dry_run_skips_updates() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![1_i64])).await;
    mock_action(
        &server,
        "notesInfo",
        mock_anki_response(vec![note_info(
            1,
            "Basic",
            [("Front", "Define dopamine"), ("Back", GOOD)],
        )]),
    )
    .await;
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Front", "Back"]),
    )
    .await;
    mock_action_times(
        &server,
        "updateNoteFields",
        mock_anki_response(serde_json::Value::Null),
        0,
    )
    .await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .dry_run(true)
        .repair("*")
        .await
        .unwrap();

    assert_eq!(report.repaired, 1);
}

#[tokio::test]
async fn test_failed_fetch_batch_fails_every_id() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![1_i64, 2, 3])).await;
    mock_action_with_params(
        &server,
        "notesInfo",
        serde_json::json!({"notes": [1, 2]}),
        mock_anki_error("collection is not available"),
    )
    .await;
    mock_action_with_params(
        &server,
        "notesInfo",
        serde_json::json!({"notes": [3]}),
        mock_anki_response(vec![note_info(
            3,
            "Basic",
            [("Front", "What is dopamine?"), ("Back", GOOD)],
        )]),
    )
    .await;
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Front", "Back"]),
    )
    .await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .with_batch_size(2)
        .repair("*")
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 2);
    assert_eq!(report.unchanged, 1);
    let failed: Vec<_> = report.failures.iter().map(|f| f.note_id).collect();
    assert_eq!(failed, vec![Some(1), Some(2)]);
    assert!(report.failures[0].error.contains("collection is not available"));
}

#[tokio::test]
async fn test_update_failure_recorded_and_batch_continues() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![1_i64, 2])).await;
    mock_action(
        &server,
        "notesInfo",
        mock_anki_response(vec![
            note_info(1, "Basic", [("Front", "Define dopamine"), ("Back", GOOD)]),
            note_info(2, "Basic", [("Front", "What is dopamine"), ("Back", GOOD)]),
        ]),
    )
    .await;
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Front", "Back"]),
    )
    .await;
    mock_action_with_params(
        &server,
        "updateNoteFields",
        serde_json::json!({"note": {"id": 1}}),
        mock_anki_error("note was not found"),
    )
    .await;
    mock_action_with_params(
        &server,
        "updateNoteFields",
        serde_json::json!({"note": {"id": 2}}),
        mock_anki_response(serde_json::Value::Null),
    )
    .await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .repair("*")
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.repaired, 1);
    assert_eq!(report.failures[0].note_id, Some(1));
    assert_eq!(report.samples(3).len(), 1);
}

#[tokio::test]
async fn test_flagged_note_with_failed_write_counts_once() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![3_i64])).await;
    mock_action(
        &server,
        "notesInfo",
        mock_anki_response(vec![note_info(
            3,
            "Basic",
            [("Front", "What is a gene?"), ("Back", "Review this answer")],
        )]),
    )
    .await;
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Front", "Back"]),
    )
    .await;
    mock_action(&server, "updateNoteFields", mock_anki_error("collection is not available")).await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .repair("*")
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.flagged, 0);
    assert!(report.flagged_notes.is_empty());
    assert_eq!(
        report.repaired + report.unchanged + report.flagged + report.dropped + report.failed,
        report.processed
    );
}

#[tokio::test]
async fn test_import_failed_write_not_counted_as_flagged() {
    let server = setup_mock_server().await;

    mock_action(&server, "addNote", mock_anki_error("cannot create note because it is empty")).await;

    let schema = NoteSchema::basic();
    let notes = vec![
        Note::new("Neuro", &schema)
            .with_field("Front", "")
            .with_field("Back", GOOD),
    ];
    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .import(&notes, &schema)
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.flagged, 0);
    assert_eq!(report.created, 0);
}

#[tokio::test]
async fn test_transient_errors_retried() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![7_i64])).await;
    mock_action_times(
        &server,
        "notesInfo",
        mock_anki_response(Vec::<serde_json::Value>::new()).set_delay(Duration::from_millis(500)),
        2,
    )
    .await;

    let store = store_with_timeout(&server, Duration::from_millis(100));
    let report = RepairEngine::new(&store, Normalizer::default())
        .with_retry(RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
        })
        .repair("*")
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].note_id, Some(7));
}

#[tokio::test]
async fn test_delete_matching_deletes_only_hits() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![1_i64, 2])).await;
    mock_action(
        &server,
        "notesInfo",
        mock_anki_response(vec![
            note_info(1, "Basic", [("Front", "What is dopamine?"), ("Back", GOOD)]),
            note_info(
                2,
                "Basic",
                [
                    ("Front", "What is the <b>Tower of Hanoi</b> used for?"),
                    ("Back", "Text, 378 Tower of Hanoi test, 59"),
                ],
            ),
        ]),
    )
    .await;
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Front", "Back"]),
    )
    .await;
    mock_action_with_params(
        &server,
        "deleteNotes",
        serde_json::json!({"notes": [2]}),
        mock_anki_response(serde_json::Value::Null),
    )
    .await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .delete_matching("deck:Neuro", &ContentMatch::new("TOWER OF HANOI"))
        .await
        .unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.matched, 1);
    assert_eq!(report.deleted_ids, vec![2]);
}

#[tokio::test]
async fn test_missing_answer_field_fails_notes() {
    let server = setup_mock_server().await;

    mock_action(&server, "findNotes", mock_anki_response(vec![1_i64])).await;
    mock_action(
        &server,
        "notesInfo",
        mock_anki_response(vec![note_info(
            1,
            "Odd",
            [("Word", "Synapse"), ("Picture", "")],
        )]),
    )
    .await;
    mock_action(
        &server,
        "modelFieldNames",
        mock_anki_response(vec!["Word", "Picture"]),
    )
    .await;

    let store = store_for_mock(&server);
    let report = RepairEngine::new(&store, Normalizer::default())
        .repair("*")
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.failures[0].error.contains("Odd"));
}
