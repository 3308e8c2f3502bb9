//! Audience resolution.
//!
//! Turns a target specification into the concrete, ordered recipient list.
//! Always reads the store fresh — resolution happens at confirmation time so
//! registrations landing between selection and confirmation are included.

use anyhow::Result;

use courier_common::{ChatId, TargetSpec};

use crate::traits::ParticipantRepo;

/// Distinct recipient ids for `target`, most recently registered first,
/// with the operator's own id excluded.
pub async fn resolve<P: ParticipantRepo>(
    participants: &P,
    target: TargetSpec,
    operator: ChatId,
) -> Result<Vec<ChatId>> {
    let ids: Vec<ChatId> = match target {
        TargetSpec::All => participants
            .list_all()
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
        TargetSpec::Country { code } => participants
            .list_by_country(code)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect(),
        TargetSpec::Participant { id } => match participants.get(id).await? {
            Some(p) => vec![p.id],
            None => vec![],
        },
    };

    let mut seen = std::collections::HashSet::new();
    Ok(ids
        .into_iter()
        .filter(|id| *id != operator && seen.insert(*id))
        .collect())
}
