//! Mission context resolution
//!
//! Runs once at startup. Any failure leaves the context unset and the
//! command sink skips its sends.

use contracts::MissionId;
use tracing::{info, instrument, warn};

use crate::api::CommandApi;
use crate::session::SessionManager;

/// Resolve the mission that command-service messages are posted to
///
/// With a configured id, the first resource assigned to that mission names
/// the mission; an empty assignment list keeps the configured id. Without a
/// configured id the first entry of the mission listing is used; the
/// unfiltered resource listing is never queried.
#[instrument(name = "resolve_mission", skip(session))]
pub async fn resolve_mission<A: CommandApi + Sync>(
    session: &SessionManager<A>,
    configured: Option<MissionId>,
) -> Option<MissionId> {
    let resolved = match configured {
        Some(mission_id) => match session.mission_resources(mission_id).await {
            Ok(resources) => Some(
                resources
                    .first()
                    .map(|r| MissionId::from(r.mission_id))
                    .unwrap_or(mission_id),
            ),
            Err(e) => {
                warn!(mission = %mission_id, error = %e, "Listing mission resources failed");
                None
            }
        },
        None => match session.missions().await {
            Ok(missions) => {
                let first = missions.first().map(|m| MissionId::from(m.id));
                if first.is_none() {
                    warn!("Command service lists no missions");
                }
                first
            }
            Err(e) => {
                warn!(error = %e, "Listing missions failed");
                None
            }
        },
    };

    match resolved {
        Some(mission) => info!(mission = %mission, "Mission context resolved"),
        None => warn!("Mission context unresolved"),
    }
    resolved
}
