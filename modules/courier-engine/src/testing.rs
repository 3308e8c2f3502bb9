//! Recording test doubles for the sender/notifier/monitor seams.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use courier_common::{ChatId, MessagePayload, Participant};

use crate::report::DeliveryProgress;
use crate::traits::{BroadcastMonitor, MessageSender, OperatorNotifier, SendFailure};

/// MessageSender that records every delivery and fails for a scripted set
/// of recipients.
#[derive(Default)]
pub struct RecordingSender {
    fail_for: HashSet<ChatId>,
    sent: Mutex<Vec<(ChatId, MessagePayload)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            fail_for: ids.into_iter().collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Deliveries attempted and accepted, in order.
    pub fn sent(&self) -> Vec<(ChatId, MessagePayload)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, recipient: ChatId, payload: &MessagePayload) -> Result<(), SendFailure> {
        if self.fail_for.contains(&recipient) {
            return Err(SendFailure::new("recipient unreachable"));
        }
        self.sent.lock().unwrap().push((recipient, payload.clone()));
        Ok(())
    }
}

/// OperatorNotifier that records notices and fails for a scripted set of
/// operators.
#[derive(Default)]
pub struct RecordingNotifier {
    fail_for: HashSet<ChatId>,
    notices: Mutex<Vec<(ChatId, Participant)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(ids: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            fail_for: ids.into_iter().collect(),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn notices(&self) -> Vec<(ChatId, Participant)> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorNotifier for RecordingNotifier {
    async fn notify(&self, operator: ChatId, participant: &Participant) -> Result<(), SendFailure> {
        if self.fail_for.contains(&operator) {
            return Err(SendFailure::new("operator unreachable"));
        }
        self.notices
            .lock()
            .unwrap()
            .push((operator, participant.clone()));
        Ok(())
    }
}

/// BroadcastMonitor that records every progress event.
#[derive(Default)]
pub struct RecordingMonitor {
    events: Mutex<Vec<(ChatId, DeliveryProgress)>>,
}

impl RecordingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(ChatId, DeliveryProgress)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BroadcastMonitor for RecordingMonitor {
    async fn on_progress(&self, operator: ChatId, progress: &DeliveryProgress) {
        self.events.lock().unwrap().push((operator, *progress));
    }
}
