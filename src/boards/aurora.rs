//! Aurora board family.
//!
//! Several vendors run the same Aurora backend under different host bases
//! (`kilterboardapp`, `tensionboardapp2`, ...). Everything below is
//! parameterized by the resolved host base: log in once, then pull the user's
//! ascents table through repeated sync calls until the backend reports the
//! sync as complete.

use async_stream::stream;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::COOKIE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::traits::{AscentStream, BoardProvider, BoardSession};
use super::types::{
    BoardFamily, Credentials, RawAscent, ResolvedBoard, SessionHandle, parse_backend_date,
};
use crate::config::AuroraSettings;
use crate::error::BoardError;
use crate::grades::NativeGrade;
use crate::http::{HttpClient, read_json};

/// Built-in Aurora deployments (board identifier -> host base)
pub const HOST_BASES: &[(&str, &str)] = &[
    ("aurora", "auroraboardapp"),
    ("decoy", "decoyboardapp"),
    ("grasshopper", "grasshopperboardapp"),
    ("kilter", "kilterboardapp"),
    ("soill", "soillboardapp"),
    ("tension", "tensionboardapp2"),
    ("touchstone", "touchstoneboardapp"),
];

/// Cursor value requesting the full table
const SYNC_EPOCH: &str = "1970-01-01 00:00:00.000000";

pub struct AuroraProvider {
    settings: AuroraSettings,
    http: HttpClient,
}

impl AuroraProvider {
    pub fn new(settings: AuroraSettings, http: HttpClient) -> Self {
        Self { settings, http }
    }

    /// Configured host bases take precedence over the built-in ones
    pub fn host_base(&self, board: &str) -> Option<String> {
        self.settings.host_bases.get(board).cloned().or_else(|| {
            HOST_BASES
                .iter()
                .find(|(name, _)| *name == board)
                .map(|(_, host_base)| host_base.to_string())
        })
    }

    pub fn base_url(&self, host_base: &str) -> String {
        self.settings
            .url_template
            .replace("{host_base}", host_base)
            .trim_end_matches('/')
            .to_string()
    }
}

impl BoardProvider for AuroraProvider {
    fn family(&self) -> BoardFamily {
        BoardFamily::Aurora
    }

    fn identifiers(&self) -> Vec<String> {
        HOST_BASES
            .iter()
            .map(|(name, _)| name.to_string())
            .chain(self.settings.host_bases.keys().cloned())
            .collect()
    }

    fn claims(&self, board: &str) -> bool {
        self.host_base(board).is_some()
    }

    fn open(&self, board: &ResolvedBoard) -> Result<Box<dyn BoardSession>, BoardError> {
        let host_base = self
            .host_base(&board.identifier)
            .ok_or_else(|| BoardError::UnknownBoard(board.identifier.clone()))?;

        Ok(Box::new(AuroraSession {
            http: self.http.clone(),
            board: board.identifier.clone(),
            base_url: self.base_url(&host_base),
        }))
    }
}

pub struct AuroraSession {
    http: HttpClient,
    board: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    tou: &'static str,
    pp: &'static str,
    ua: &'static str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: LoginSession,
}

#[derive(Debug, Deserialize)]
struct LoginSession {
    token: String,
    user_id: u64,
}

#[derive(Debug, Deserialize)]
struct SyncPage {
    #[serde(default)]
    ascents: Vec<AuroraAscent>,
    #[serde(default)]
    user_syncs: Vec<SyncMarker>,
    /// Responses without the flag carry the whole table
    #[serde(rename = "_complete", default = "complete_by_default")]
    complete: bool,
}

fn complete_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SyncMarker {
    table_name: String,
    last_synchronized_at: String,
}

#[derive(Debug, Deserialize)]
struct AuroraAscent {
    climb_uuid: String,
    #[serde(default)]
    angle: Option<u16>,
    #[serde(default)]
    bid_count: u32,
    difficulty: i64,
    climbed_at: String,
    #[serde(default = "listed_by_default")]
    is_listed: bool,
}

fn listed_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ClimbResponse {
    name: String,
}

impl AuroraAscent {
    fn into_raw(self, name: String) -> Result<RawAscent, BoardError> {
        Ok(RawAscent {
            family: BoardFamily::Aurora,
            angle: self.angle,
            name,
            date: parse_backend_date(&self.climbed_at)?,
            grade: NativeGrade::Difficulty(self.difficulty),
            tries: self.bid_count,
        })
    }
}

impl AuroraSession {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, BoardError> {
        let body = LoginRequest {
            username: credentials.username(),
            password: credentials.secret(),
            tou: "accepted",
            pp: "accepted",
            ua: "app",
        };

        let response = self
            .http
            .client()
            .post(format!("{}/sessions", self.base_url))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => Err(
                BoardError::authentication(&self.board, "invalid username or password"),
            ),
            _ => read_json(response).await,
        }
    }
}

#[async_trait]
impl BoardSession for AuroraSession {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, BoardError> {
        let login = self
            .http
            .retry()
            .run("aurora authenticate", || self.login(credentials))
            .await?;

        info!(
            board = %self.board,
            user_id = login.session.user_id,
            "Authenticated with Aurora backend"
        );
        Ok(SessionHandle::new(
            login.session.token,
            Some(login.session.user_id),
        ))
    }

    fn fetch_ascents(&self, handle: &SessionHandle) -> AscentStream {
        let sync = SyncClient {
            http: self.http.clone(),
            board: self.board.clone(),
            base_url: self.base_url.clone(),
            token: handle.token().to_string(),
        };

        Box::pin(stream! {
            let mut cursor = SYNC_EPOCH.to_string();
            // climb names for this run only
            let mut names: HashMap<String, String> = HashMap::new();
            let mut page = 0u32;

            loop {
                page += 1;
                let body = match sync
                    .http
                    .retry()
                    .run("aurora sync page", || sync.fetch(&cursor))
                    .await
                {
                    Ok(body) => body,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                debug!(
                    board = %sync.board,
                    page,
                    ascents = body.ascents.len(),
                    complete = body.complete,
                    "Fetched Aurora sync page"
                );

                let next_cursor = body
                    .user_syncs
                    .iter()
                    .find(|marker| marker.table_name == "ascents")
                    .map(|marker| marker.last_synchronized_at.clone());

                for ascent in body.ascents {
                    if !ascent.is_listed {
                        debug!(climb = %ascent.climb_uuid, "Skipping unlisted ascent");
                        continue;
                    }

                    let name = match names.get(&ascent.climb_uuid) {
                        Some(name) => name.clone(),
                        None => {
                            let lookup = sync
                                .http
                                .retry()
                                .run("aurora climb lookup", || sync.climb_name(&ascent.climb_uuid))
                                .await;
                            match lookup {
                                Ok(name) => {
                                    names.insert(ascent.climb_uuid.clone(), name.clone());
                                    name
                                }
                                Err(e) => {
                                    yield Err(e);
                                    return;
                                }
                            }
                        }
                    };

                    yield ascent.into_raw(name);
                }

                if body.complete {
                    break;
                }

                match next_cursor.filter(|next| *next != cursor) {
                    Some(next) => cursor = next,
                    None => {
                        yield Err(BoardError::Transport(format!(
                            "sync for {} did not advance past {}",
                            sync.board, cursor
                        )));
                        return;
                    }
                }
            }
        })
    }
}

/// Authenticated access to one Aurora host, owned by a logbook stream
struct SyncClient {
    http: HttpClient,
    board: String,
    base_url: String,
    token: String,
}

impl SyncClient {
    fn cookie(&self) -> String {
        format!("token={}", self.token)
    }

    async fn fetch(&self, cursor: &str) -> Result<SyncPage, BoardError> {
        let response = self
            .http
            .client()
            .post(format!("{}/sync", self.base_url))
            .header(COOKIE, self.cookie())
            .form(&[("ascents", cursor)])
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(BoardError::authentication(
                &self.board,
                "session token rejected",
            ));
        }

        read_json(response).await
    }

    async fn climb_name(&self, climb_uuid: &str) -> Result<String, BoardError> {
        let response = self
            .http
            .client()
            .get(format!("{}/climbs/{}", self.base_url, climb_uuid))
            .header(COOKIE, self.cookie())
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(BoardError::authentication(
                &self.board,
                "session token rejected",
            )),
            StatusCode::NOT_FOUND => {
                warn!(board = %self.board, climb = climb_uuid, "Climb not found, using its id as name");
                Ok(climb_uuid.to_string())
            }
            _ => {
                let climb: ClimbResponse = read_json(response).await?;
                Ok(climb.name)
            }
        }
    }
}
