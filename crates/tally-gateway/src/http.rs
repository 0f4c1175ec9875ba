use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use tally_config::GatewayConfig;
use tally_reconcile::{ResolveDecision, ResolveErrorsDecision};
use tally_schemas::{EntryNumber, SessionSnapshot, TypistId};

use crate::{
    ClaimResponse, ErrorResponse, FinaliseResponse, GatewayError, ResolveDifferencesRequest,
    ResolveErrorsRequest, SaveRequest, SaveResponse, SessionGateway, StatusResponse,
    TypistRequest,
};

/// REST client for the tally daemon.
///
/// 409 is a conflict, 5xx and connection failures are transport errors, and
/// every other non-success status carries an [`ErrorResponse`] body.
#[derive(Debug, Clone)]
pub struct HttpSessionGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSessionGateway {
    pub fn new_with_base_url(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn from_config(cfg: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(cfg.timeout()).build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
        })
    }

    fn entries_url(&self, polling_station_id: u32) -> String {
        format!(
            "{}/v1/polling_stations/{polling_station_id}/data_entries",
            self.base_url.trim_end_matches('/')
        )
    }

    fn entry_url(&self, polling_station_id: u32, entry: EntryNumber, action: Option<&str>) -> String {
        let base = format!("{}/{}", self.entries_url(polling_station_id), entry.as_u8());
        match action {
            Some(action) => format!("{base}/{action}"),
            None => base,
        }
    }

    async fn post<B, T>(&self, url: String, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("POST {url}: {e}")))?;
        decode(resp).await
    }

    /// POST whose success body is ignored.
    async fn post_ack<B>(&self, url: String, body: &B) -> Result<(), GatewayError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("POST {url}: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(error_from(resp).await)
        }
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, GatewayError> {
    if !resp.status().is_success() {
        return Err(error_from(resp).await);
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| GatewayError::Transport(format!("reading response body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
}

async fn error_from(resp: reqwest::Response) -> GatewayError {
    let status = resp.status();
    if status.is_server_error() {
        return GatewayError::Transport(format!("http status={}", status.as_u16()));
    }

    let body = match resp.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorResponse>(&bytes),
        Err(e) => return GatewayError::Transport(format!("reading error body: {e}")),
    };
    match body {
        Ok(body) if status == StatusCode::CONFLICT => GatewayError::Conflict(body),
        Ok(body) if body.fatal => GatewayError::Fatal(body),
        Ok(body) => GatewayError::Rejected(body),
        Err(e) => GatewayError::Decode(format!(
            "http status={} with unreadable error body: {e}",
            status.as_u16()
        )),
    }
}

#[async_trait::async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn claim(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<ClaimResponse, GatewayError> {
        let body = TypistRequest {
            typist: typist.clone(),
        };
        self.post(self.entry_url(polling_station_id, entry, Some("claim")), &body)
            .await
    }

    async fn save(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
        snapshot: &SessionSnapshot,
    ) -> Result<SaveResponse, GatewayError> {
        let body = SaveRequest {
            typist: typist.clone(),
            snapshot: snapshot.clone(),
        };
        self.post(self.entry_url(polling_station_id, entry, None), &body)
            .await
    }

    async fn release(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<(), GatewayError> {
        let body = TypistRequest {
            typist: typist.clone(),
        };
        self.post_ack(self.entry_url(polling_station_id, entry, Some("release")), &body)
            .await
    }

    async fn finalize(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<FinaliseResponse, GatewayError> {
        let body = TypistRequest {
            typist: typist.clone(),
        };
        self.post(self.entry_url(polling_station_id, entry, Some("finalise")), &body)
            .await
    }

    async fn discard(
        &self,
        polling_station_id: u32,
        entry: EntryNumber,
        typist: &TypistId,
    ) -> Result<(), GatewayError> {
        let body = TypistRequest {
            typist: typist.clone(),
        };
        self.post_ack(self.entry_url(polling_station_id, entry, Some("discard")), &body)
            .await
    }

    async fn resolve_difference(
        &self,
        polling_station_id: u32,
        decision: ResolveDecision,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/resolve_differences", self.entries_url(polling_station_id));
        self.post_ack(url, &ResolveDifferencesRequest { decision })
            .await
    }

    async fn resolve_errors(
        &self,
        polling_station_id: u32,
        decision: ResolveErrorsDecision,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/resolve_errors", self.entries_url(polling_station_id));
        self.post_ack(url, &ResolveErrorsRequest { decision }).await
    }

    async fn status(&self, polling_station_id: u32) -> Result<StatusResponse, GatewayError> {
        let url = self.entries_url(polling_station_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("GET {url}: {e}")))?;
        decode(resp).await
    }
}
