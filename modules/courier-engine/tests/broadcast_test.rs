//! Integration tests for the broadcast engine, run against the in-memory
//! store, a scripted sender, and a recording progress monitor.

use std::sync::Arc;

use courier_engine::broadcast::Broadcaster;
use courier_engine::repos::MemoryStore;
use courier_engine::testing::{RecordingMonitor, RecordingSender};
use courier_engine::{audience, Reply};

use chrono::{Duration, Utc};
use courier_common::{ChatId, CountryCode, LanguageCode, MessagePayload, Participant, TargetSpec};

const OP: ChatId = ChatId(9001);
const OUTSIDER: ChatId = ChatId(4444);

fn participant(id: i64, country: CountryCode, minutes_ago: i64) -> Participant {
    let registered_at = Utc::now() - Duration::minutes(minutes_ago);
    Participant {
        id: ChatId(id),
        name: format!("P{id}"),
        phone: format!("+555{id}"),
        language: LanguageCode::Eng,
        country,
        registered_at,
        last_active: registered_at,
    }
}

fn text(body: &str) -> MessagePayload {
    MessagePayload::Text { body: body.into() }
}

struct Fixture {
    store: Arc<MemoryStore>,
    sender: Arc<RecordingSender>,
    monitor: Arc<RecordingMonitor>,
    broadcaster: Broadcaster<Arc<MemoryStore>, Arc<RecordingSender>, Arc<RecordingMonitor>>,
}

fn fixture(sender: RecordingSender) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(sender);
    let monitor = Arc::new(RecordingMonitor::new());
    let broadcaster = Broadcaster::new(
        store.clone(),
        sender.clone(),
        monitor.clone(),
        vec![OP],
    );
    Fixture {
        store,
        sender,
        monitor,
        broadcaster,
    }
}

// ---------------------------------------------------------------------------
// Audience resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_all_is_most_recent_first_and_excludes_operator() {
    let store = Arc::new(MemoryStore::new());
    store.seed_participant(participant(1, CountryCode::Bd, 30));
    store.seed_participant(participant(2, CountryCode::Ru, 10));
    store.seed_participant(participant(3, CountryCode::Bd, 20));
    store.seed_participant(participant(OP.0, CountryCode::Bd, 5));

    let ids = audience::resolve(&store, TargetSpec::All, OP).await.unwrap();
    assert_eq!(ids, vec![ChatId(2), ChatId(3), ChatId(1)]);
}

#[tokio::test]
async fn resolve_country_filters_exactly() {
    let store = Arc::new(MemoryStore::new());
    store.seed_participant(participant(1, CountryCode::Bd, 30));
    store.seed_participant(participant(2, CountryCode::Ru, 10));
    store.seed_participant(participant(3, CountryCode::Bd, 20));

    let ids = audience::resolve(&store, TargetSpec::Country { code: CountryCode::Bd }, OP)
        .await
        .unwrap();
    assert_eq!(ids, vec![ChatId(3), ChatId(1)]);
}

#[tokio::test]
async fn resolve_single_participant_is_singleton_or_empty() {
    let store = Arc::new(MemoryStore::new());
    store.seed_participant(participant(1, CountryCode::Bd, 30));

    let ids = audience::resolve(&store, TargetSpec::Participant { id: ChatId(1) }, OP)
        .await
        .unwrap();
    assert_eq!(ids, vec![ChatId(1)]);

    let ids = audience::resolve(&store, TargetSpec::Participant { id: ChatId(999) }, OP)
        .await
        .unwrap();
    assert!(ids.is_empty());
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn outsiders_are_denied_without_state_mutation() {
    let f = fixture(RecordingSender::new());

    assert_eq!(
        f.broadcaster.on_operator_command(OUTSIDER).await.unwrap(),
        Reply::Denied
    );
    assert_eq!(
        f.broadcaster
            .on_audience_selected(OUTSIDER, TargetSpec::All)
            .await
            .unwrap(),
        Reply::Denied
    );
    assert!(!f.broadcaster.has_active_job(OUTSIDER).await);

    // Free-form messages from outsiders never enter the broadcast flow.
    assert_eq!(
        f.broadcaster
            .on_operator_message(OUTSIDER, text("hi"))
            .await
            .unwrap(),
        None
    );
}

// ---------------------------------------------------------------------------
// The full flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn country_broadcast_isolates_one_failure() {
    let f = fixture(RecordingSender::failing_for([ChatId(2)]));
    f.store.seed_participant(participant(1, CountryCode::Bd, 30));
    f.store.seed_participant(participant(2, CountryCode::Bd, 20));
    f.store.seed_participant(participant(3, CountryCode::Bd, 10));
    f.store.seed_participant(participant(4, CountryCode::Ru, 5));

    let reply = f.broadcaster.on_operator_command(OP).await.unwrap();
    assert_eq!(reply, Reply::AudiencePrompt { total_participants: 4 });

    let reply = f
        .broadcaster
        .on_audience_selected(OP, TargetSpec::Country { code: CountryCode::Bd })
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::MessagePrompt {
            target: TargetSpec::Country { code: CountryCode::Bd }
        }
    );

    let reply = f
        .broadcaster
        .on_operator_message(OP, text("big news"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        Some(Reply::ConfirmPrompt {
            target: TargetSpec::Country { code: CountryCode::Bd },
            preview: "big news".into(),
            audience_size: 3,
        })
    );

    let reply = f.broadcaster.on_confirm(OP).await.unwrap();
    let Reply::BroadcastReport { report, .. } = reply else {
        panic!("expected BroadcastReport, got {reply:?}");
    };
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded + report.failed, report.total);
    assert_eq!(report.success_rate(), 66.7);

    // The two reachable recipients got the payload; the Russian participant
    // was never touched.
    let sent = f.sender.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(_, p)| *p == text("big news")));
    assert!(sent.iter().all(|(id, _)| *id != ChatId(4)));

    // Job cleared after reporting.
    assert!(!f.broadcaster.has_active_job(OP).await);
}

#[tokio::test]
async fn single_recipient_flow_validates_existence_first() {
    let f = fixture(RecordingSender::new());
    f.store.seed_participant(participant(1, CountryCode::Bd, 30));

    f.broadcaster.on_operator_command(OP).await.unwrap();
    assert_eq!(
        f.broadcaster.on_recipient_requested(OP).await.unwrap(),
        Reply::RecipientPrompt
    );

    // Nonexistent id: still selecting.
    let reply = f
        .broadcaster
        .on_operator_message(OP, text("999"))
        .await
        .unwrap();
    assert_eq!(reply, Some(Reply::UnknownRecipient { id: ChatId(999) }));
    assert!(f.broadcaster.has_active_job(OP).await);

    // Garbage id: rejected with a parse hint.
    let reply = f
        .broadcaster
        .on_operator_message(OP, text("not-a-number"))
        .await
        .unwrap();
    assert_eq!(reply, Some(Reply::RecipientRejected));

    // Valid id advances to message capture.
    let reply = f
        .broadcaster
        .on_operator_message(OP, text("1"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        Some(Reply::MessagePrompt {
            target: TargetSpec::Participant { id: ChatId(1) }
        })
    );
}

#[tokio::test]
async fn empty_audience_never_enters_sending() {
    let f = fixture(RecordingSender::new());
    // No Bangladeshi participants at all.
    f.store.seed_participant(participant(1, CountryCode::Ru, 10));

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::Country { code: CountryCode::Bd })
        .await
        .unwrap();

    let reply = f
        .broadcaster
        .on_operator_message(OP, text("hello"))
        .await
        .unwrap();
    assert_eq!(reply, Some(Reply::NoRecipients));

    // Job discarded; nothing was sent.
    assert!(!f.broadcaster.has_active_job(OP).await);
    assert!(f.sender.sent().is_empty());
    assert!(f.monitor.events().is_empty());
}

#[tokio::test]
async fn unrelated_input_at_confirmation_changes_nothing() {
    let f = fixture(RecordingSender::new());
    f.store.seed_participant(participant(1, CountryCode::Bd, 10));

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("the real payload"))
        .await
        .unwrap();

    // Neither confirm nor cancel: ignored.
    let reply = f
        .broadcaster
        .on_operator_message(OP, text("wait, what does this button do"))
        .await
        .unwrap();
    assert_eq!(reply, Some(Reply::ConfirmationPending));
    assert!(f.broadcaster.has_active_job(OP).await);

    // Confirming afterwards delivers the original payload, not the noise.
    f.broadcaster.on_confirm(OP).await.unwrap();
    let sent = f.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, text("the real payload"));
}

#[tokio::test]
async fn stale_selection_callback_at_confirmation_is_ignored() {
    let f = fixture(RecordingSender::new());
    f.store.seed_participant(participant(1, CountryCode::Bd, 10));

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("pending payload"))
        .await
        .unwrap();

    // A tap on a stale audience keyboard must not reset the job.
    let reply = f
        .broadcaster
        .on_audience_selected(OP, TargetSpec::Country { code: CountryCode::Ru })
        .await
        .unwrap();
    assert_eq!(reply, Reply::ConfirmationPending);

    f.broadcaster.on_confirm(OP).await.unwrap();
    let sent = f.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ChatId(1));
    assert_eq!(sent[0].1, text("pending payload"));
}

#[tokio::test]
async fn cancel_at_confirmation_discards_job() {
    let f = fixture(RecordingSender::new());
    f.store.seed_participant(participant(1, CountryCode::Bd, 10));

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("never mind"))
        .await
        .unwrap();

    assert_eq!(
        f.broadcaster.on_cancel(OP).await.unwrap(),
        Reply::BroadcastCancelled
    );
    assert!(!f.broadcaster.has_active_job(OP).await);
    assert!(f.sender.sent().is_empty());
}

#[tokio::test]
async fn new_command_replaces_previous_job_entirely() {
    let f = fixture(RecordingSender::new());
    f.store.seed_participant(participant(1, CountryCode::Bd, 10));

    // First job gets as far as the confirmation gate.
    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("stale payload"))
        .await
        .unwrap();

    // Fresh entry wipes it.
    let reply = f.broadcaster.on_operator_command(OP).await.unwrap();
    assert_eq!(reply, Reply::AudiencePrompt { total_participants: 1 });

    // The new job must re-collect target and payload from scratch.
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("fresh payload"))
        .await
        .unwrap();
    f.broadcaster.on_confirm(OP).await.unwrap();

    let sent = f.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, text("fresh payload"));
}

// ---------------------------------------------------------------------------
// Confirmation-time resolution and progress cadence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn audience_is_resolved_fresh_at_confirmation() {
    let f = fixture(RecordingSender::new());
    f.store.seed_participant(participant(1, CountryCode::Bd, 10));

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::Country { code: CountryCode::Bd })
        .await
        .unwrap();
    let reply = f
        .broadcaster
        .on_operator_message(OP, text("hello"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        Some(Reply::ConfirmPrompt {
            target: TargetSpec::Country { code: CountryCode::Bd },
            preview: "hello".into(),
            audience_size: 1,
        })
    );

    // A registration lands between capture and confirm.
    f.store.seed_participant(participant(2, CountryCode::Bd, 0));

    let reply = f.broadcaster.on_confirm(OP).await.unwrap();
    let Reply::BroadcastReport { report, .. } = reply else {
        panic!("expected BroadcastReport, got {reply:?}");
    };
    assert_eq!(report.total, 2);
    assert_eq!(f.sender.sent().len(), 2);
}

#[tokio::test]
async fn progress_surfaces_every_tenth_and_final_recipient() {
    let f = fixture(RecordingSender::new());
    for i in 1..=25 {
        f.store.seed_participant(participant(i, CountryCode::Bd, i));
    }

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("bulletin"))
        .await
        .unwrap();
    f.broadcaster.on_confirm(OP).await.unwrap();

    let events = f.monitor.events();
    let marks: Vec<usize> = events.iter().map(|(_, p)| p.processed).collect();
    assert_eq!(marks, vec![10, 20, 25]);

    let (op, last) = events.last().unwrap();
    assert_eq!(*op, OP);
    assert_eq!(last.total, 25);
    assert_eq!(last.succeeded + last.failed, 25);
}

#[tokio::test]
async fn report_accounts_for_every_recipient() {
    let f = fixture(RecordingSender::failing_for([
        ChatId(3),
        ChatId(7),
        ChatId(11),
    ]));
    for i in 1..=12 {
        f.store.seed_participant(participant(i, CountryCode::Bd, i));
    }

    f.broadcaster.on_operator_command(OP).await.unwrap();
    f.broadcaster
        .on_audience_selected(OP, TargetSpec::All)
        .await
        .unwrap();
    f.broadcaster
        .on_operator_message(OP, text("bulletin"))
        .await
        .unwrap();
    let reply = f.broadcaster.on_confirm(OP).await.unwrap();

    let Reply::BroadcastReport { report, .. } = reply else {
        panic!("expected BroadcastReport, got {reply:?}");
    };
    assert_eq!(report.total, 12);
    assert_eq!(report.succeeded, 9);
    assert_eq!(report.failed, 3);
    assert_eq!(report.success_rate(), 75.0);
}
