//! CommandSink - posts each event as a mission message

use chrono::Local;
use contracts::{ContractError, EventSink, FusedEvent, MissionId};
use tracing::{debug, instrument};

use crate::api::{CommandApi, MissionMessage, MESSAGE_STATUS_SENT};
use crate::session::SessionManager;

/// Default sink name
pub const COMMAND_SINK: &str = "command";

/// Sink writing events to the command service's mission log
///
/// Without a resolved mission every write fails before authenticating.
pub struct CommandSink<A> {
    name: String,
    session: SessionManager<A>,
    mission: Option<MissionId>,
}

impl<A: CommandApi + Sync> CommandSink<A> {
    pub fn new(session: SessionManager<A>, mission: Option<MissionId>) -> Self {
        Self {
            name: COMMAND_SINK.to_string(),
            session,
            mission,
        }
    }

    pub fn mission(&self) -> Option<MissionId> {
        self.mission
    }

    pub fn session(&self) -> &SessionManager<A> {
        &self.session
    }
}

impl<A: CommandApi + Send + Sync> EventSink for CommandSink<A> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "command_sink_write",
        skip(self, event),
        fields(sink = %self.name, sender = %event.sender)
    )]
    async fn write(&mut self, event: &FusedEvent) -> Result<(), ContractError> {
        let Some(mission) = self.mission else {
            return Err(ContractError::delivery(&self.name, "mission context unresolved"));
        };

        let message = MissionMessage {
            date: Local::now().fixed_offset(),
            text: event.text.clone(),
            message_status: MESSAGE_STATUS_SENT,
            sender_name: event.sender.clone(),
            receiver_name: event.receiver.clone(),
        };

        self.session.send_message(mission, &message).await?;
        debug!(sink = %self.name, mission = %mission, "Mission message posted");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "CommandSink closed");
        Ok(())
    }
}
