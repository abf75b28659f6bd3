// SPDX-FileCopyrightText: 2026 Syllabind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-token lookup for WebSocket and HTTP authentication.

use rusqlite::params;
use syllabind_core::SyllabindError;

use crate::database::{Database, map_tr_err};
use crate::models::AuthIdentity;

/// Resolve a session token to its user. Expired tokens resolve to `None`.
pub async fn authenticate(db: &Database, token: &str) -> Result<Option<AuthIdentity>, SyllabindError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT u.id, u.username
                 FROM auth_sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1
                   AND (s.expires_at IS NULL OR s.expires_at > strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))",
                params![token],
                |row| {
                    Ok(AuthIdentity {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                    })
                },
            );
            match result {
                Ok(identity) => Ok(Some(identity)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a user.
pub async fn insert_user(db: &Database, id: &str, username: &str) -> Result<(), SyllabindError> {
    let (id, username) = (id.to_string(), username.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)",
                params![id, username],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a session token. `expires_at` is an RFC 3339 UTC timestamp.
pub async fn insert_session(
    db: &Database,
    token: &str,
    user_id: &str,
    expires_at: Option<&str>,
) -> Result<(), SyllabindError> {
    let token = token.to_string();
    let user_id = user_id.to_string();
    let expires_at = expires_at.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO auth_sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token, user_id, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
