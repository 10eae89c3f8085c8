//! Moon board family.
//!
//! All Moon boards share one API host. Authentication is an OAuth password
//! grant; the logbook is a numbered, fixed-size page listing filtered by the
//! board setup.

use async_stream::stream;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use super::traits::{AscentStream, BoardProvider, BoardSession};
use super::types::{
    BoardFamily, Credentials, RawAscent, ResolvedBoard, SessionHandle, parse_backend_date,
};
use crate::config::MoonSettings;
use crate::error::BoardError;
use crate::grades::NativeGrade;
use crate::http::{HttpClient, read_json};

/// Any identifier with this prefix belongs to the Moon family
pub const MOON_PREFIX: &str = "moon";

/// Known Moon boards and their setup ids
pub const MOON_BOARDS: &[(&str, u32)] = &[
    ("mini-moonboard2020", 15),
    ("moonboard2016", 1),
    ("moonboard2017", 2),
    ("moonboard2019", 3),
    ("moonboard2024", 17),
];

pub fn setup_id(board: &str) -> Option<u32> {
    MOON_BOARDS
        .iter()
        .find(|(name, _)| *name == board)
        .map(|(_, id)| *id)
}

/// Whether `board` belongs to the Moon family: a known board or the prefix
pub fn is_moon_board(board: &str) -> bool {
    setup_id(board).is_some() || board.starts_with(MOON_PREFIX)
}

pub struct MoonProvider {
    settings: MoonSettings,
    http: HttpClient,
}

impl MoonProvider {
    pub fn new(settings: MoonSettings, http: HttpClient) -> Self {
        Self { settings, http }
    }
}

impl BoardProvider for MoonProvider {
    fn family(&self) -> BoardFamily {
        BoardFamily::Moon
    }

    fn identifiers(&self) -> Vec<String> {
        MOON_BOARDS.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn claims(&self, board: &str) -> bool {
        is_moon_board(board)
    }

    fn open(&self, board: &ResolvedBoard) -> Result<Box<dyn BoardSession>, BoardError> {
        Ok(Box::new(MoonSession {
            settings: self.settings.clone(),
            http: self.http.clone(),
            board: board.identifier.clone(),
            // generic identifiers such as "moonboard" read every setup
            setup_id: setup_id(&board.identifier),
        }))
    }
}

pub struct MoonSession {
    settings: MoonSettings,
    http: HttpClient,
    board: String,
    setup_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LogbookPage {
    #[serde(default)]
    data: Vec<MoonEntry>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MoonEntry {
    problem: MoonProblem,
    date_climbed: String,
    #[serde(default)]
    number_of_tries: u32,
    #[serde(default)]
    angle: Option<u16>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MoonProblem {
    name: String,
    grade: String,
}

impl MoonEntry {
    fn into_raw(self) -> Result<RawAscent, BoardError> {
        Ok(RawAscent {
            family: BoardFamily::Moon,
            angle: self.angle,
            name: self.problem.name,
            date: parse_backend_date(&self.date_climbed)?,
            grade: NativeGrade::Label(self.problem.grade),
            tries: self.number_of_tries,
        })
    }
}

impl MoonSession {
    fn api_url(&self) -> &str {
        self.settings.api_url.trim_end_matches('/')
    }

    async fn request_token(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> Result<TokenResponse, BoardError> {
        let form = [
            ("grant_type", "password"),
            ("client_id", self.settings.client_id.as_str()),
            ("username", credentials.username()),
            ("password", credentials.secret()),
            ("refresh_token", ""),
        ];

        let response = self.http.client().post(url).form(&form).send().await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let reason = response
                    .json::<OAuthError>()
                    .await
                    .map(|e| e.error_description.unwrap_or(e.error))
                    .unwrap_or_else(|_| "credentials rejected".to_string());
                Err(BoardError::authentication(&self.board, reason))
            }
            _ => read_json(response).await,
        }
    }
}

#[async_trait]
impl BoardSession for MoonSession {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, BoardError> {
        let url = format!("{}/token", self.api_url());

        let token = self
            .http
            .retry()
            .run("moon authenticate", || self.request_token(&url, credentials))
            .await?;

        info!(board = %self.board, "Authenticated with Moon backend");
        Ok(SessionHandle::new(token.access_token, None))
    }

    fn fetch_ascents(&self, handle: &SessionHandle) -> AscentStream {
        let cursor = PageCursor {
            http: self.http.clone(),
            board: self.board.clone(),
            url: format!("{}/v1/_moonapi/logbook/entries", self.api_url()),
            token: handle.token().to_string(),
            setup_id: self.setup_id,
            page_size: self.settings.page_size,
        };

        Box::pin(stream! {
            let mut page = 1u32;
            let mut received = 0u64;

            loop {
                let body = match cursor
                    .http
                    .retry()
                    .run("moon logbook page", || cursor.fetch(page))
                    .await
                {
                    Ok(body) => body,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let count = body.data.len();
                debug!(
                    board = %cursor.board,
                    page,
                    entries = count,
                    total = ?body.total,
                    "Fetched Moon logbook page"
                );

                if count == 0 {
                    break;
                }
                received += count as u64;

                for entry in body.data {
                    yield entry.into_raw();
                }

                let last_page = match body.total {
                    Some(total) => received >= total,
                    // without a total only a short page marks the end
                    None => count < cursor.page_size as usize,
                };
                if last_page {
                    break;
                }
                page += 1;
            }
        })
    }
}

/// Everything one logbook stream needs, owned by the stream
struct PageCursor {
    http: HttpClient,
    board: String,
    url: String,
    token: String,
    setup_id: Option<u32>,
    page_size: u32,
}

impl PageCursor {
    async fn fetch(&self, page: u32) -> Result<LogbookPage, BoardError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(setup_id) = self.setup_id {
            query.push(("setupId", setup_id.to_string()));
        }

        let response = self
            .http
            .client()
            .get(&self.url)
            .bearer_auth(&self.token)
            .query(&query)
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
}
