//! WebSocket gateway for the student app
//!
//! Each connection may be bound to one student after an OTP login or a token
//! authentication. Replies travel through a per-connection channel so REST
//! handlers can push events (new tuition payments) to a student's sockets.

use super::public_message;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use campus_core::validate::required;
use campus_core::{
    AnneePayload, AvatarPayload, CampusError, ClientMessage, CommandeRef, CommandeUpdate,
    MontantPayload, RechargeInput, RechargeRef, RechargeStatut, RechargeUpdate, Result,
    ServerMessage, SoldePayload, TokenPayload,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct Connection {
    tx: mpsc::UnboundedSender<ServerMessage>,
    etudiant_id: Option<String>,
    last_seen: Instant,
}

/// Open sockets keyed by connection id.
#[derive(Clone)]
pub struct ConnectionManager {
    connections: Arc<RwLock<HashMap<String, Connection>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, connection_id: &str, tx: mpsc::UnboundedSender<ServerMessage>) {
        let mut conns = self.connections.write().await;
        conns.insert(
            connection_id.to_string(),
            Connection {
                tx,
                etudiant_id: None,
                last_seen: Instant::now(),
            },
        );
        debug!("Connection registered: {}", connection_id);
    }

    pub async fn unregister(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        if let Some(conn) = conns.remove(connection_id) {
            info!(
                "Connection closed: {} (student {:?})",
                connection_id, conn.etudiant_id
            );
        }
    }

    pub async fn bind(&self, connection_id: &str, etudiant_id: &str) {
        let mut conns = self.connections.write().await;
        if let Some(conn) = conns.get_mut(connection_id) {
            conn.etudiant_id = Some(etudiant_id.to_string());
            conn.last_seen = Instant::now();
            info!("Connection {} bound to student {}", connection_id, etudiant_id);
        }
    }

    pub async fn unbind(&self, connection_id: &str) -> Option<String> {
        let mut conns = self.connections.write().await;
        conns
            .get_mut(connection_id)
            .and_then(|conn| conn.etudiant_id.take())
    }

    pub async fn student_of(&self, connection_id: &str) -> Option<String> {
        let conns = self.connections.read().await;
        conns
            .get(connection_id)
            .and_then(|conn| conn.etudiant_id.clone())
    }

    pub async fn touch(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        if let Some(conn) = conns.get_mut(connection_id) {
            conn.last_seen = Instant::now();
        }
    }

    /// Sends to every connection bound to the student; returns how many
    /// accepted the message.
    pub async fn send_to_student(&self, etudiant_id: &str, msg: ServerMessage) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|conn| conn.etudiant_id.as_deref() == Some(etudiant_id))
            .filter(|conn| conn.tx.send(msg.clone()).is_ok())
            .count()
    }

    /// Unbinds students whose connection has been silent longer than
    /// `max_idle` and tells them the session is over.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut conns = self.connections.write().await;
        let mut pruned = 0;
        for conn in conns.values_mut() {
            if conn.etudiant_id.is_some() && conn.last_seen.elapsed() > max_idle {
                conn.etudiant_id = None;
                let _ = conn.tx.send(ServerMessage::ok(
                    "auth:logged-out",
                    &json!({"message": "Session expirée"}),
                ));
                pruned += 1;
            }
        }
        pruned
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle WebSocket upgrade
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("New WebSocket connection: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.connections.register(&connection_id, tx.clone()).await;

    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode reply: {}", e),
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.connections.touch(&connection_id).await;
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => handle_message(&state, &connection_id, client_msg).await,
                    Err(e) => {
                        warn!("Failed to parse message: {}", e);
                        ServerMessage::err("error", format!("Message invalide: {}", e))
                    }
                };
                if tx.send(reply).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket connection closed: {}", connection_id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    state.connections.unregister(&connection_id).await;
    forward_task.abort();
}

/// Runs one client event and builds the reply. Failures are reported on
/// the event that caused them.
pub async fn handle_message(state: &AppState, connection_id: &str, msg: ClientMessage) -> ServerMessage {
    let event = msg.event();
    let etudiant_id = state.connections.student_of(connection_id).await;

    if msg.requires_auth() && etudiant_id.is_none() {
        return ServerMessage::err("error", "Authentification requise");
    }

    match dispatch(state, connection_id, etudiant_id.as_deref().unwrap_or_default(), msg).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("{} failed: {}", event, e);
            ServerMessage::err(event, public_message(&e))
        }
    }
}

async fn dispatch(
    state: &AppState,
    connection_id: &str,
    etudiant_id: &str,
    msg: ClientMessage,
) -> Result<ServerMessage> {
    let reply = match msg {
        ClientMessage::RequestOtp(request) => {
            let sent = state.auth.request_otp(request).await?;
            ServerMessage::ok("auth:otp-sent", &sent)
        }
        ClientMessage::VerifyOtp(verification) => {
            let logged_in = state.auth.verify_otp(verification).await?;
            state
                .connections
                .bind(connection_id, &logged_in.etudiant.id)
                .await;
            ServerMessage::ok("auth:logged-in", &logged_in)
        }
        ClientMessage::Authenticate(TokenPayload { token }) => {
            let token = required(token.as_deref(), "Token requis")?;
            let claims = state.auth.validate_token(&token)?;
            let etudiant = state.etudiants.get(&claims.sub).await.map_err(|e| match e {
                CampusError::NotFound(_) => CampusError::unauthorized("Étudiant non trouvé"),
                other => other,
            })?;
            state.connections.bind(connection_id, &etudiant.id).await;
            ServerMessage::ok("auth:authenticated", &json!({ "etudiant": etudiant }))
        }
        ClientMessage::Logout => {
            if let Some(id) = state.connections.unbind(connection_id).await {
                info!("Student {} logged out", id);
            }
            ServerMessage::ok(
                "auth:logged-out",
                &json!({"message": "Déconnexion réussie"}),
            )
        }
        ClientMessage::SearchByName(search) => {
            let hits = state.etudiants.search_by_name(&search).await?;
            ServerMessage::ok("auth:search-results", &hits)
        }

        ClientMessage::GetProfile => {
            let etudiant = state.etudiants.profile(etudiant_id).await?;
            ServerMessage::ok("etudiant:profile", &etudiant)
        }
        ClientMessage::UpdateProfile(input) => {
            let etudiant = state.etudiants.update(etudiant_id, input).await?;
            ServerMessage::ok("etudiant:profile-updated", &etudiant)
        }
        ClientMessage::UpdateAvatar(AvatarPayload { avatar }) => {
            let avatar = state
                .etudiants
                .update_avatar(etudiant_id, avatar.as_deref())
                .await?;
            ServerMessage::ok("etudiant:avatar-updated", &json!({ "avatar": avatar }))
        }
        ClientMessage::GetSolde => {
            let solde = state.etudiants.solde(etudiant_id).await?;
            ServerMessage::ok("etudiant:solde", &json!({ "solde": solde }))
        }
        ClientMessage::RechargeSolde(MontantPayload { montant }) => {
            let input = RechargeInput {
                montant,
                statut: Some(RechargeStatut::Completed),
                phone: None,
            };
            let result = state.accounts.add_recharge(etudiant_id, input).await?;
            ServerMessage::ok(
                "etudiant:solde-updated",
                &json!({ "solde": result.solde, "recharge": result.recharge }),
            )
        }
        ClientMessage::GetActifs(AnneePayload { annee_id }) => {
            let actifs = state
                .etudiants
                .actifs(etudiant_id, annee_id.as_deref())
                .await?;
            ServerMessage::ok("etudiant:actifs", &actifs)
        }

        ClientMessage::GetTransactions => {
            let account = state.accounts.view(etudiant_id).await?;
            ServerMessage::ok("transaction:all", &account)
        }
        ClientMessage::UpdateSolde(SoldePayload { solde }) => {
            let solde = state.accounts.set_solde(etudiant_id, solde).await?;
            ServerMessage::ok("transaction:solde-updated", &json!({ "solde": solde }))
        }
        ClientMessage::AddCommande(input) => {
            let result = state.accounts.add_commande(etudiant_id, input).await?;
            ServerMessage::ok("transaction:commande-added", &result)
        }
        ClientMessage::UpdateCommande(CommandeUpdate {
            commande_id,
            product,
            montant,
        }) => {
            let result = state
                .accounts
                .update_commande(
                    etudiant_id,
                    commande_id.as_deref(),
                    product.as_deref(),
                    montant,
                )
                .await?;
            ServerMessage::ok("transaction:commande-updated", &result)
        }
        ClientMessage::DeleteCommande(CommandeRef { commande_id }) => {
            let solde = state
                .accounts
                .delete_commande(etudiant_id, commande_id.as_deref())
                .await?;
            ServerMessage::ok(
                "transaction:commande-deleted",
                &json!({ "commandeId": commande_id, "solde": solde }),
            )
        }
        ClientMessage::AddRecharge(input) => {
            let result = state.accounts.add_recharge(etudiant_id, input).await?;
            ServerMessage::ok("transaction:recharge-added", &result)
        }
        ClientMessage::CheckRecharge(RechargeRef { recharge_id }) => {
            let check = state
                .accounts
                .check_recharge(etudiant_id, recharge_id.as_deref())
                .await?;
            ServerMessage::ok("transaction:recharge-checked", &check)
        }
        ClientMessage::UpdateRecharge(RechargeUpdate {
            recharge_id,
            montant,
            statut,
        }) => {
            let result = state
                .accounts
                .update_recharge(etudiant_id, recharge_id.as_deref(), montant, statut)
                .await?;
            ServerMessage::ok("transaction:recharge-updated", &result)
        }
        ClientMessage::DeleteRecharge(RechargeRef { recharge_id }) => {
            let solde = state
                .accounts
                .delete_recharge(etudiant_id, recharge_id.as_deref())
                .await?;
            ServerMessage::ok(
                "transaction:recharge-deleted",
                &json!({ "rechargeId": recharge_id, "solde": solde }),
            )
        }

        ClientMessage::Ping => ServerMessage::pong(),
    };
    Ok(reply)
}
