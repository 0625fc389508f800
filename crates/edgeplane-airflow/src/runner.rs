//! Client for the Airflow webserver.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::RunnerError;

/// The runner operations dispatch and pruning rely on.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn unpause(&self, dag: &str) -> Result<(), RunnerError>;
    async fn pause(&self, dag: &str) -> Result<(), RunnerError>;
    async fn trigger(&self, dag: &str, run_id: &str, conf: &Value) -> Result<(), RunnerError>;
    /// Drop the runner's records of a DAG whose file is gone.
    async fn forget(&self, dag: &str) -> Result<(), RunnerError>;
}

/// HTTP client for the Airflow experimental API and admin UI.
pub struct AirflowClient {
    client: Client,
    base_url: String,
    session: Mutex<Option<String>>,
}

impl AirflowClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RunnerError> {
        // Redirects are not followed so an expired admin session shows up as
        // a 302 to the login page rather than as the login page itself.
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(RunnerError::Client)?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_owned(),
            session: Mutex::new(None),
        })
    }

    async fn set_paused(&self, dag: &str, paused: bool) -> Result<(), RunnerError> {
        let url = format!("{}/api/experimental/dags/{dag}/paused/{paused}", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(transport(&url))?;
        check(&url, resp)?;
        debug!(%dag, paused, "dag pause state set");
        Ok(())
    }

    /// The admin session cookie, fetched from `/admin/` on first use.
    async fn session_cookie(&self) -> Result<String, RunnerError> {
        let mut session = self.session.lock().await;
        if let Some(cookie) = session.as_ref() {
            return Ok(cookie.clone());
        }

        let url = format!("{}/admin/", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(transport(&url))?;
        // The login view may answer with a redirect that still sets the cookie.
        let resp = if resp.status().is_redirection() {
            resp
        } else {
            check(&url, resp)?
        };
        let cookie = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .find(|pair| pair.trim_start().starts_with("session="))
            .map(|pair| pair.trim().to_string())
            .ok_or(RunnerError::NoSession)?;

        *session = Some(cookie.clone());
        Ok(cookie)
    }

    /// Forget `stale` so the next call logs in again.
    async fn drop_session(&self, stale: &str) {
        let mut session = self.session.lock().await;
        if session.as_deref() == Some(stale) {
            *session = None;
        }
    }

    async fn delete_dag(&self, url: &str, dag: &str, cookie: &str) -> Result<Response, RunnerError> {
        self.client
            .get(url)
            .query(&[("dag_id", dag)])
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(transport(url))
    }
}

#[async_trait]
impl WorkflowRunner for AirflowClient {
    async fn unpause(&self, dag: &str) -> Result<(), RunnerError> {
        self.set_paused(dag, false).await
    }

    async fn pause(&self, dag: &str) -> Result<(), RunnerError> {
        self.set_paused(dag, true).await
    }

    async fn trigger(&self, dag: &str, run_id: &str, conf: &Value) -> Result<(), RunnerError> {
        let url = format!("{}/api/experimental/dags/{dag}/dag_runs", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "run_id": run_id, "conf": conf }))
            .send()
            .await
            .map_err(transport(&url))?;
        check(&url, resp)?;
        debug!(%dag, %run_id, "dag run triggered");
        Ok(())
    }

    async fn forget(&self, dag: &str) -> Result<(), RunnerError> {
        let url = format!("{}/admin/airflow/delete", self.base_url);
        let cookie = self.session_cookie().await?;
        let mut resp = self.delete_dag(&url, dag, &cookie).await?;
        if session_expired(resp.status()) {
            debug!(%dag, status = %resp.status(), "admin session rejected; logging in again");
            self.drop_session(&cookie).await;
            let cookie = self.session_cookie().await?;
            resp = self.delete_dag(&url, dag, &cookie).await?;
        }
        check(&url, resp)?;
        debug!(%dag, "dag forgotten by runner");
        Ok(())
    }
}

fn session_expired(status: StatusCode) -> bool {
    status == StatusCode::FOUND || status == StatusCode::UNAUTHORIZED
}

fn transport(url: &str) -> impl FnOnce(reqwest::Error) -> RunnerError + '_ {
    move |source| RunnerError::Transport {
        url: url.to_string(),
        source,
    }
}

fn check(url: &str, resp: Response) -> Result<Response, RunnerError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(RunnerError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
