//! Call signaling workflow.
//!
//! ```text
//! initiate ──► ringing ──answer──► answered ──end──► ended
//!                 │ └────reject──► declined
//!                 └──────end─────────────────────────► ended
//! ```
//!
//! Every transition is persisted with a compare-and-set on the prior status,
//! then the counterpart is notified through the hub. Notifications never fail
//! the operation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tether_common::envelope::{CallEnded, CallRef, Event, IncomingCall};
use tether_common::error::{TetherError, TetherResult};
use tether_common::ids::{generate_channel_name, generate_id};
use tether_common::models::{CallKind, CallLog, CallStatus, Participant, UserProfile};
use tether_gateway::HubHandle;
use uuid::Uuid;

use crate::credentials::{CALLEE_UID, CALLER_UID, MediaCredentialIssuer};
use crate::directory::CallerDirectory;
use crate::store::CallLogStore;

/// What a participant needs to join the relay channel.
#[derive(Debug, Clone, Serialize)]
pub struct CallTicket {
    pub call_id: Uuid,
    pub channel_name: String,
    pub token: String,
    pub uid: u32,
    pub app_id: String,
}

/// Final state of a call after reject or hang-up.
#[derive(Debug, Clone, Serialize)]
pub struct CallOutcome {
    pub call_id: Uuid,
    pub channel_name: String,
    /// Relay uid of the participant who acted.
    pub uid: u32,
    pub status: CallStatus,
    pub duration: i64,
}

impl CallOutcome {
    fn for_actor(call: &CallLog, actor: Uuid) -> Self {
        let uid = match call.participant(actor) {
            Some(Participant::Callee) => CALLEE_UID,
            _ => CALLER_UID,
        };
        Self {
            call_id: call.id,
            channel_name: call.channel_name.clone(),
            uid,
            status: call.status,
            duration: call.duration_secs,
        }
    }
}

#[derive(Clone)]
pub struct CallSignaling {
    hub: HubHandle,
    store: CallLogStore,
    directory: CallerDirectory,
    credentials: Arc<dyn MediaCredentialIssuer>,
}

impl CallSignaling {
    pub fn new(
        hub: HubHandle,
        store: CallLogStore,
        directory: CallerDirectory,
        credentials: Arc<dyn MediaCredentialIssuer>,
    ) -> Self {
        Self {
            hub,
            store,
            directory,
            credentials,
        }
    }

    pub async fn initiate(&self, caller: Uuid, callee: Uuid, call_type: &str) -> TetherResult<CallTicket> {
        self.initiate_at(caller, callee, call_type, Utc::now()).await
    }

    pub async fn answer(&self, call_id: Uuid, user_id: Uuid) -> TetherResult<CallTicket> {
        self.answer_at(call_id, user_id, Utc::now()).await
    }

    pub async fn reject(&self, call_id: Uuid, user_id: Uuid) -> TetherResult<CallOutcome> {
        self.reject_at(call_id, user_id, Utc::now()).await
    }

    pub async fn end(&self, call_id: Uuid, user_id: Uuid) -> TetherResult<CallOutcome> {
        self.end_at(call_id, user_id, Utc::now()).await
    }

    /// Start ringing `callee`. No row is written if the credential can't be issued.
    pub async fn initiate_at(
        &self,
        caller: Uuid,
        callee: Uuid,
        call_type: &str,
        now: DateTime<Utc>,
    ) -> TetherResult<CallTicket> {
        let kind: CallKind = call_type.parse()?;
        if caller == callee {
            return Err(TetherError::validation("cannot call yourself"));
        }

        let channel_name = generate_channel_name(now);
        let token = self.issue(&channel_name, CALLER_UID)?;

        let call = CallLog::ringing(generate_id(), caller, callee, kind, channel_name, now);
        self.store.insert(&call).await?;

        tracing::info!(
            call = %call.id,
            caller = %caller,
            callee = %callee,
            kind = %kind,
            "Call initiated"
        );

        let profile = self.caller_profile(caller).await;
        self.hub.send_to_user(
            callee,
            Event::IncomingCall(IncomingCall {
                call_id: call.id,
                caller_id: caller,
                caller_name: profile.as_ref().map(|p| p.full_name.clone()),
                caller_avatar: profile.and_then(|p| p.avatar_url),
                call_type: kind.as_str().to_string(),
                channel_name: call.channel_name.clone(),
            }),
        );

        Ok(self.ticket(&call, token, CALLER_UID))
    }

    /// Callee picks up.
    pub async fn answer_at(&self, call_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> TetherResult<CallTicket> {
        let mut call = self.load_as(call_id, user_id, Some(Participant::Callee)).await?;
        if call.status != CallStatus::Ringing {
            return Err(TetherError::invalid_state("call is no longer ringing"));
        }

        let token = self.issue(&call.channel_name, CALLEE_UID)?;
        call.answer(now)?;
        self.commit(&call, CallStatus::Ringing).await?;

        tracing::info!(call = %call.id, "Call answered");
        self.hub
            .send_to_user(call.caller_id, Event::CallAnswered(CallRef { call_id: call.id }));

        Ok(self.ticket(&call, token, CALLEE_UID))
    }

    /// Callee declines while ringing.
    pub async fn reject_at(&self, call_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> TetherResult<CallOutcome> {
        let mut call = self.load_as(call_id, user_id, Some(Participant::Callee)).await?;
        call.decline(now)?;
        self.commit(&call, CallStatus::Ringing).await?;

        tracing::info!(call = %call.id, "Call rejected");
        self.hub
            .send_to_user(call.caller_id, Event::CallRejected(CallRef { call_id: call.id }));

        Ok(CallOutcome::for_actor(&call, user_id))
    }

    /// Either side hangs up, or the caller cancels while ringing.
    pub async fn end_at(&self, call_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> TetherResult<CallOutcome> {
        let mut call = self.load_as(call_id, user_id, None).await?;
        let prior = call.status;
        call.end(now)?;
        self.commit(&call, prior).await?;

        tracing::info!(call = %call.id, duration = call.duration_secs, "Call ended");
        self.hub.send_to_user(
            call.counterpart(user_id),
            Event::CallEnded(CallEnded {
                call_id: call.id,
                duration: call.duration_secs,
            }),
        );

        Ok(CallOutcome::for_actor(&call, user_id))
    }

    /// Display details for the ringing screen. A failed lookup only costs
    /// the callee the name and avatar.
    async fn caller_profile(&self, caller: Uuid) -> Option<UserProfile> {
        match self.directory.lookup(caller).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user = %caller, error = %e, "Caller profile lookup failed");
                None
            }
        }
    }

    /// Fetch a call on behalf of `user_id`. Strangers see not-found; a
    /// participant on the wrong side is forbidden.
    async fn load_as(&self, call_id: Uuid, user_id: Uuid, role: Option<Participant>) -> TetherResult<CallLog> {
        let call = self
            .store
            .find(call_id)
            .await?
            .ok_or_else(|| TetherError::not_found("Call"))?;

        match (call.participant(user_id), role) {
            (None, _) => Err(TetherError::not_found("Call")),
            (Some(actual), Some(required)) if actual != required => Err(TetherError::Forbidden),
            _ => Ok(call),
        }
    }

    async fn commit(&self, call: &CallLog, expected: CallStatus) -> TetherResult<()> {
        if self.store.update_if_status(call, expected).await? {
            Ok(())
        } else {
            Err(TetherError::invalid_state("call changed concurrently"))
        }
    }

    fn issue(&self, channel: &str, uid: u32) -> TetherResult<String> {
        self.credentials.issue(channel, uid).map_err(|e| {
            tracing::error!(channel, error = %e, "Media credential issuance failed");
            TetherError::Upstream {
                message: e.to_string(),
            }
        })
    }

    fn ticket(&self, call: &CallLog, token: String, uid: u32) -> CallTicket {
        CallTicket {
            call_id: call.id,
            channel_name: call.channel_name.clone(),
            token,
            uid,
            app_id: self.credentials.app_id().to_string(),
        }
    }
}
