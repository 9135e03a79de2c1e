//! Session membership handlers.
//!
//! Handles `join_session` and `leave_session`. Access is verified once, at
//! join time, through the [`crate::access::RoomAccess`] collaborator; it is
//! not re-checked on later broadcasts or membership queries.

use super::{Context, Handler, decode};
use crate::error::{HandlerError, HandlerResult};
use crate::events::{JoinSession, LeaveSession, ServerEvent};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Handler for `join_session`.
pub struct JoinSessionHandler;

#[async_trait]
impl Handler for JoinSessionHandler {
    async fn handle(&self, ctx: &Context<'_>, data: &Value) -> HandlerResult {
        let payload: JoinSession = decode(data)?;

        // Collaborator call; no state is touched until it approves. The
        // access check suspends here without holding any lock, so other
        // connections' events interleave freely.
        let allowed = ctx
            .access
            .verify(
                &ctx.identity.id,
                &payload.session_id,
                payload.access_code.as_deref(),
            )
            .await
            .map_err(|e| {
                warn!(
                    conn_id = %ctx.conn_id,
                    session = %payload.session_id,
                    error = %e,
                    "Access verification unavailable"
                );
                HandlerError::JoinFailed("access verification unavailable".to_string())
            })?;

        if !allowed {
            return Err(HandlerError::AccessDenied);
        }

        // Re-joins are set no-ops but each join event is treated
        // independently: the ack and the join broadcast fire either way.
        ctx.hub.rooms.insert(&payload.session_id, ctx.conn_id);

        ctx.sender
            .send(ServerEvent::session_joined(&payload.session_id))
            .await?;
        ctx.hub.broadcast_to_room(
            &payload.session_id,
            ServerEvent::user_joined(ctx.identity),
            Some(ctx.conn_id),
        );

        info!(
            conn_id = %ctx.conn_id,
            user_id = %ctx.identity.id,
            session = %payload.session_id,
            "Joined session"
        );
        Ok(())
    }
}

/// Handler for `leave_session`.
pub struct LeaveSessionHandler;

#[async_trait]
impl Handler for LeaveSessionHandler {
    async fn handle(&self, ctx: &Context<'_>, data: &Value) -> HandlerResult {
        let payload: LeaveSession = decode(data)?;

        // No-op if the connection was never a member.
        ctx.hub.rooms.remove(&payload.session_id, ctx.conn_id);

        ctx.sender
            .send(ServerEvent::session_left(&payload.session_id))
            .await?;
        ctx.hub.broadcast_to_room(
            &payload.session_id,
            ServerEvent::user_left(ctx.identity),
            Some(ctx.conn_id),
        );

        info!(
            conn_id = %ctx.conn_id,
            user_id = %ctx.identity.id,
            session = %payload.session_id,
            "Left session"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{CodeGate, FixedAccess, connect, test_hub};
    use super::*;
    use crate::access::RoomAccess;
    use crate::events::ClientFrame;
    use crate::handlers::Registry;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    async fn dispatch(
        hub: &Arc<crate::state::Hub>,
        access: &Arc<dyn RoomAccess>,
        conn: &str,
        sender: &mpsc::Sender<ServerEvent>,
        event: &str,
        data: serde_json::Value,
    ) -> HandlerResult {
        let identity = hub.identity_of(conn).expect("registered");
        let ctx = Context {
            conn_id: conn,
            identity: &identity,
            hub,
            access,
            sender,
        };
        let frame = ClientFrame {
            event: event.to_string(),
            data,
        };
        Registry::new().dispatch(&ctx, &frame).await
    }

    #[tokio::test]
    async fn denied_join_changes_nothing() {
        let hub = test_hub();
        let access: Arc<dyn RoomAccess> = Arc::new(FixedAccess(false));
        let (conn, _rx) = connect(&hub, "bob", "Bob");
        let (tx, mut ack_rx) = mpsc::channel(4);

        let err = dispatch(&hub, &access, &conn, &tx, "join_session", json!({"session_id": "r1"}))
            .await
            .expect_err("denied");

        assert!(matches!(err, HandlerError::AccessDenied));
        assert!(!hub.rooms.exists("r1"));
        assert!(ack_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn approved_join_acks_and_notifies_others() {
        let hub = test_hub();
        let access: Arc<dyn RoomAccess> = Arc::new(FixedAccess(true));

        let (conn_a, mut rx_a) = connect(&hub, "alice", "Alice");
        hub.rooms.insert("r1", &conn_a);

        let (conn_b, _rx_b) = connect(&hub, "bob", "Bob");
        let (tx_b, mut ack_b) = mpsc::channel(4);

        dispatch(&hub, &access, &conn_b, &tx_b, "join_session", json!({"session_id": "r1"}))
            .await
            .expect("join");

        // Joiner gets the ack on its own queue.
        assert!(matches!(
            ack_b.try_recv().expect("ack"),
            ServerEvent::SessionJoined { .. }
        ));

        // The prior member sees the join; the joiner is excluded.
        match rx_a.try_recv().expect("join notice") {
            ServerEvent::UserJoined { user_id, display_name, .. } => {
                assert_eq!(user_id, "bob");
                assert_eq!(display_name, "Bob");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let mut members = hub.members_of("r1");
        members.sort();
        assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn rejoin_is_idempotent_but_still_broadcasts() {
        let hub = test_hub();
        let access: Arc<dyn RoomAccess> = Arc::new(FixedAccess(true));

        let (conn_a, mut rx_a) = connect(&hub, "alice", "Alice");
        hub.rooms.insert("r1", &conn_a);

        let (conn_b, _rx_b) = connect(&hub, "bob", "Bob");
        let (tx_b, _ack_b) = mpsc::channel(8);

        for _ in 0..2 {
            dispatch(&hub, &access, &conn_b, &tx_b, "join_session", json!({"session_id": "r1"}))
                .await
                .expect("join");
        }

        assert_eq!(hub.members_of("r1").len(), 2);
        // Both joins produced a broadcast.
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn access_code_gate() {
        let hub = test_hub();
        let access: Arc<dyn RoomAccess> = Arc::new(CodeGate("XYZ"));
        let (conn, _rx) = connect(&hub, "bob", "Bob");
        let (tx, _ack) = mpsc::channel(4);

        let err = dispatch(
            &hub,
            &access,
            &conn,
            &tx,
            "join_session",
            json!({"session_id": "r2", "access_code": "ABC"}),
        )
        .await
        .expect_err("wrong code");
        assert!(matches!(err, HandlerError::AccessDenied));

        dispatch(
            &hub,
            &access,
            &conn,
            &tx,
            "join_session",
            json!({"session_id": "r2", "access_code": "XYZ"}),
        )
        .await
        .expect("right code");
        assert_eq!(hub.members_of("r2"), vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn leave_notifies_remaining_members() {
        let hub = test_hub();
        let access: Arc<dyn RoomAccess> = Arc::new(FixedAccess(true));

        let (conn_a, mut rx_a) = connect(&hub, "alice", "Alice");
        let (conn_b, _rx_b) = connect(&hub, "bob", "Bob");
        hub.rooms.insert("r1", &conn_a);
        hub.rooms.insert("r1", &conn_b);

        let (tx_b, mut ack_b) = mpsc::channel(4);
        dispatch(&hub, &access, &conn_b, &tx_b, "leave_session", json!({"session_id": "r1"}))
            .await
            .expect("leave");

        assert!(matches!(
            ack_b.try_recv().expect("ack"),
            ServerEvent::SessionLeft { .. }
        ));
        assert!(matches!(
            rx_a.try_recv().expect("departure"),
            ServerEvent::UserLeft { .. }
        ));
        assert_eq!(hub.members_of("r1"), vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn bad_payload_is_rejected() {
        let hub = test_hub();
        let access: Arc<dyn RoomAccess> = Arc::new(FixedAccess(true));
        let (conn, _rx) = connect(&hub, "bob", "Bob");
        let (tx, _ack) = mpsc::channel(4);

        let err = dispatch(&hub, &access, &conn, &tx, "join_session", json!({"nope": 1}))
            .await
            .expect_err("bad payload");
        assert_eq!(err.error_code(), "invalid_payload");
    }
}
