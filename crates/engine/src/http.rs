use anyhow::Context;
use isles_protocol::{routes, ErrorBody, Game, Island, ListResponse, SESSION_HEADER};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::remote::RemoteStore;

/// JSON-over-HTTP client for the record server.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    session_token: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.session_token {
            Some(token) => req.header(SESSION_HEADER, token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> anyhow::Result<reqwest::Response> {
        let resp = req.send().await.context("send record request")?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        anyhow::bail!("{status}: {message}")
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> anyhow::Result<T> {
        let resp = self.send(req).await?;
        resp.json::<T>().await.context("decode record response")
    }
}

fn record_path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

impl RemoteStore for HttpRemote {
    async fn create_game(&self, draft: &Game) -> anyhow::Result<Game> {
        let req = self.request(Method::POST, routes::GAMES).json(draft);
        self.send_json(req).await
    }

    async fn update_game(&self, id: &str, game: &Game) -> anyhow::Result<Game> {
        let req = self
            .request(Method::PUT, &record_path(routes::GAMES, id))
            .json(game);
        self.send_json(req).await
    }

    async fn delete_game(&self, id: &str) -> anyhow::Result<()> {
        let req = self.request(Method::DELETE, &record_path(routes::GAMES, id));
        self.send(req).await?;
        Ok(())
    }

    async fn list_games(&self) -> anyhow::Result<Vec<Game>> {
        if self.session_token.is_none() {
            return Ok(Vec::new());
        }
        let req = self.request(Method::GET, routes::GAMES);
        let list: ListResponse<Game> = self.send_json(req).await?;
        Ok(list.results)
    }

    async fn create_island(&self, draft: &Island) -> anyhow::Result<Island> {
        let req = self.request(Method::POST, routes::ISLANDS).json(draft);
        self.send_json(req).await
    }

    async fn update_island(&self, id: &str, island: &Island) -> anyhow::Result<Island> {
        let req = self
            .request(Method::PUT, &record_path(routes::ISLANDS, id))
            .json(island);
        self.send_json(req).await
    }

    async fn delete_island(&self, id: &str) -> anyhow::Result<()> {
        let req = self.request(Method::DELETE, &record_path(routes::ISLANDS, id));
        self.send(req).await?;
        Ok(())
    }

    async fn list_islands(&self, game_id: &str) -> anyhow::Result<Vec<Island>> {
        let req = self
            .request(Method::GET, routes::ISLANDS)
            .query(&[("game", game_id)]);
        let list: ListResponse<Island> = self.send_json(req).await?;
        Ok(list.results)
    }
}
