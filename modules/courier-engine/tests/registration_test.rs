//! Integration tests for the registration state machine, run against the
//! in-memory store and a recording notifier.

use std::sync::Arc;

use courier_engine::registration::RegistrationFlow;
use courier_engine::repos::MemoryStore;
use courier_engine::testing::RecordingNotifier;
use courier_engine::traits::SessionRepo;
use courier_engine::Reply;

use chrono::Utc;
use courier_common::{
    ChatId, CountryCode, LanguageCode, Participant, RegistrationStep,
};

const P1: ChatId = ChatId(1001);
const OP1: ChatId = ChatId(9001);
const OP2: ChatId = ChatId(9002);

fn flow(
    store: &Arc<MemoryStore>,
    notifier: &Arc<RecordingNotifier>,
) -> RegistrationFlow<Arc<MemoryStore>, Arc<MemoryStore>, Arc<RecordingNotifier>> {
    RegistrationFlow::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        vec![OP1, OP2],
    )
}

fn registered(id: ChatId) -> Participant {
    let now = Utc::now();
    Participant {
        id,
        name: "Existing".into(),
        phone: "+111".into(),
        language: LanguageCode::Eng,
        country: CountryCode::Ru,
        registered_at: now,
        last_active: now,
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_flow_commits_participant_and_clears_session() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    let reply = flow.on_first_contact(P1, "Ana").await.unwrap();
    assert_eq!(
        reply,
        Reply::PhonePrompt {
            greeting_name: "Ana".into()
        }
    );

    let reply = flow.on_contact_credential(P1, "5551234", "Ana").await.unwrap();
    assert_eq!(reply, Reply::LanguagePrompt);

    // Phone was normalized into the session data.
    let session = SessionRepo::get(&store, P1).await.unwrap().unwrap();
    assert_eq!(session.step, RegistrationStep::AwaitingLanguage);
    assert_eq!(session.data.name.as_deref(), Some("Ana"));
    assert_eq!(session.data.phone.as_deref(), Some("+5551234"));

    let reply = flow.on_language_choice(P1, "ENG").await.unwrap();
    assert_eq!(
        reply,
        Reply::CountryPrompt {
            language: LanguageCode::Eng
        }
    );

    let session = SessionRepo::get(&store, P1).await.unwrap().unwrap();
    assert_eq!(session.step, RegistrationStep::AwaitingCountry);
    assert_eq!(session.data.language, Some(LanguageCode::Eng));

    let reply = flow.on_country_choice(P1, "BD").await.unwrap();
    let Reply::RegistrationComplete { participant } = reply else {
        panic!("expected RegistrationComplete, got {reply:?}");
    };
    assert_eq!(participant.name, "Ana");
    assert_eq!(participant.phone, "+5551234");
    assert_eq!(participant.language, LanguageCode::Eng);
    assert_eq!(participant.country, CountryCode::Bd);

    // Exactly one governing record remains.
    assert_eq!(store.session_count(), 0);
    let stored = store.participant(P1).unwrap();
    assert_eq!(stored.phone, "+5551234");

    // Both operators were told.
    let notices = notifier.notices();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].0, OP1);
    assert_eq!(notices[1].0, OP2);
    assert_eq!(notices[0].1.id, P1);
}

// ---------------------------------------------------------------------------
// Rejections never advance the step
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_input_reprompts_without_state_change() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    flow.on_first_contact(P1, "Ana").await.unwrap();

    // Text where a contact card was expected.
    let reply = flow.on_unexpected_input(P1).await.unwrap();
    assert_eq!(reply, Reply::PhoneRejected);
    let session = SessionRepo::get(&store, P1).await.unwrap().unwrap();
    assert_eq!(session.step, RegistrationStep::AwaitingPhone);

    flow.on_contact_credential(P1, "+5551234", "Ana").await.unwrap();

    // Unknown language code.
    let reply = flow.on_language_choice(P1, "XX").await.unwrap();
    assert_eq!(reply, Reply::LanguageRejected);
    let session = SessionRepo::get(&store, P1).await.unwrap().unwrap();
    assert_eq!(session.step, RegistrationStep::AwaitingLanguage);

    flow.on_language_choice(P1, "RU").await.unwrap();

    // Unknown country code.
    let reply = flow.on_country_choice(P1, "ZZ").await.unwrap();
    assert_eq!(reply, Reply::CountryRejected);
    let session = SessionRepo::get(&store, P1).await.unwrap().unwrap();
    assert_eq!(session.step, RegistrationStep::AwaitingCountry);
    assert_eq!(store.participant(P1), None);
}

#[tokio::test]
async fn retries_are_unlimited() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    flow.on_first_contact(P1, "Ana").await.unwrap();
    for _ in 0..20 {
        assert_eq!(
            flow.on_unexpected_input(P1).await.unwrap(),
            Reply::PhoneRejected
        );
    }
    // Still recoverable after every rejection.
    assert_eq!(
        flow.on_contact_credential(P1, "5551234", "Ana").await.unwrap(),
        Reply::LanguagePrompt
    );
}

// ---------------------------------------------------------------------------
// Existing participants bypass the machine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_contact_of_registered_participant_creates_no_session() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    store.seed_participant(registered(P1));

    let reply = flow.on_first_contact(P1, "Someone Else").await.unwrap();
    assert_eq!(
        reply,
        Reply::AlreadyRegistered {
            name: "Existing".into()
        }
    );
    assert_eq!(store.session_count(), 0);
}

#[tokio::test]
async fn dangling_session_loses_to_participant_record() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    store.seed_participant(registered(P1));
    // Simulate a stale session left behind by operator tampering.
    SessionRepo::upsert(&store, &courier_common::RegistrationSession::new(P1))
        .await
        .unwrap();

    assert_eq!(
        flow.on_contact_credential(P1, "222", "Ana").await.unwrap(),
        Reply::SessionMissing
    );
    // The participant record is untouched.
    assert_eq!(store.participant(P1).unwrap().phone, "+111");
}

// ---------------------------------------------------------------------------
// Idempotence under duplicate callbacks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_language_callback_is_a_no_op() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    flow.on_first_contact(P1, "Ana").await.unwrap();
    flow.on_contact_credential(P1, "5551234", "Ana").await.unwrap();
    flow.on_language_choice(P1, "ENG").await.unwrap();

    // Second submission of the same choice: re-prompt, no regression.
    let reply = flow.on_language_choice(P1, "ENG").await.unwrap();
    assert_eq!(
        reply,
        Reply::CountryPrompt {
            language: LanguageCode::Eng
        }
    );
    let session = SessionRepo::get(&store, P1).await.unwrap().unwrap();
    assert_eq!(session.step, RegistrationStep::AwaitingCountry);
}

#[tokio::test]
async fn duplicate_country_callback_creates_one_participant() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    flow.on_first_contact(P1, "Ana").await.unwrap();
    flow.on_contact_credential(P1, "5551234", "Ana").await.unwrap();
    flow.on_language_choice(P1, "ENG").await.unwrap();
    flow.on_country_choice(P1, "BD").await.unwrap();

    // Double callback after completion: the session is gone, so the second
    // submission is told to restart instead of committing twice.
    let reply = flow.on_country_choice(P1, "BD").await.unwrap();
    assert_eq!(reply, Reply::SessionMissing);
    assert!(store.participant(P1).is_some());
    assert_eq!(store.session_count(), 0);
}

// ---------------------------------------------------------------------------
// Cancellation and missing sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_deletes_session_from_any_step() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    flow.on_first_contact(P1, "Ana").await.unwrap();
    flow.on_contact_credential(P1, "5551234", "Ana").await.unwrap();

    assert_eq!(
        flow.on_cancel(P1).await.unwrap(),
        Reply::RegistrationCancelled
    );
    assert_eq!(store.session_count(), 0);

    // Subsequent step input is treated as never-started.
    assert_eq!(
        flow.on_language_choice(P1, "ENG").await.unwrap(),
        Reply::SessionMissing
    );
}

#[tokio::test]
async fn step_input_with_no_session_asks_for_restart() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let flow = flow(&store, &notifier);

    assert_eq!(
        flow.on_language_choice(P1, "ENG").await.unwrap(),
        Reply::SessionMissing
    );
    assert_eq!(
        flow.on_country_choice(P1, "BD").await.unwrap(),
        Reply::SessionMissing
    );
}

// ---------------------------------------------------------------------------
// Operator notification failures are isolated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notification_failure_does_not_roll_back_registration() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::failing_for([OP1]));
    let flow = flow(&store, &notifier);

    flow.on_first_contact(P1, "Ana").await.unwrap();
    flow.on_contact_credential(P1, "5551234", "Ana").await.unwrap();
    flow.on_language_choice(P1, "ENG").await.unwrap();
    let reply = flow.on_country_choice(P1, "BD").await.unwrap();

    assert!(matches!(reply, Reply::RegistrationComplete { .. }));
    assert!(store.participant(P1).is_some());

    // The reachable operator was still told.
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].0, OP2);
}
