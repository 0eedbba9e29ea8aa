//! In-channel bearer-token authentication.
//!
//! Tokens are issued out-of-band and presented inside the channel via the
//! `authenticate` event. Verification failure leaves the channel open and
//! unauthenticated so the client may retry.

use crate::dispatch::Session;
use crate::metrics;
use crate::state::AppState;
use beacon_core::{HubError, Identity, OnlinePeer};
use beacon_protocol::ServerEvent;
use beacon_store::entities::Role;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    pub role: Role,
    pub email: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Verify an HS256 session token and return its claims.
///
/// # Errors
///
/// Returns the underlying `jsonwebtoken` error on a bad signature, expired
/// token, or malformed claims.
pub fn verify_token(secret: &[u8], token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(data.claims)
}

/// Handle the `authenticate` event.
///
/// On success: installs the identity in the registry (evicting a prior
/// same-path session), replies `authenticated`, sends the roster of online
/// users holding the complementary role, and broadcasts a global presence
/// event to every open channel.
pub async fn authenticate(
    state: &AppState,
    session: &mut Session,
    token: Option<String>,
) -> Result<(), HubError> {
    let Some(token) = token else {
        return Err(HubError::authentication("Token required"));
    };

    let claims = verify_token(state.config.auth.token_secret.as_bytes(), &token).map_err(
        |err| {
            debug!(connection = %session.conn_id, error = %err, "Token verification failed");
            HubError::authentication("Invalid token")
        },
    )?;

    let identity = Identity {
        user_id: claims.id,
        role: claims.role,
        username: claims.email,
    };

    let peer = OnlinePeer {
        conn_id: session.conn_id.clone(),
        path: session.path.clone(),
        role: identity.role,
        username: identity.username.clone(),
        sender: session.sender.clone(),
    };
    if let Some(evicted) = state.registry.install(&identity.user_id, peer) {
        info!(
            user = %identity.user_id,
            old_connection = %evicted.conn_id,
            "Stale session takeover"
        );
    }

    info!(user = %identity.user_id, role = ?identity.role, path = %session.path, "Channel authenticated");

    session.reply(ServerEvent::authenticated(
        identity.user_id.clone(),
        identity.role,
    ));

    // Roster of the complementary role: viewers learn the online hosts,
    // hosts learn the online viewers.
    let roster = state.registry.roster_with_role(identity.role.complement());
    session.reply(match identity.role {
        Role::Viewer => ServerEvent::ActiveHosts { data: roster },
        Role::Host => ServerEvent::ActiveViewers { data: roster },
    });

    let delivered = state
        .registry
        .broadcast_all(&ServerEvent::user_status(identity.user_id.clone(), None, true));
    metrics::record_broadcast(delivered);

    session.identity = Some(identity);
    Ok(())
}
