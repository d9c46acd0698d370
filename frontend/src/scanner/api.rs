use gloo_net::http::{Request, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::types::{Alert, DashboardSnapshot, ScanSettings, SettingsUpdate, SymbolDetail};

/// REST calls against the scanner gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiClient {
    base: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<ScanSettings, String> {
        let request = Request::put(&self.url("/api/settings"))
            .json(update)
            .map_err(|err| err.to_string())?;
        decode(request.send().await.map_err(|err| err.to_string())?).await
    }

    pub async fn request_scan(&self) -> Result<(), String> {
        let response = Request::post(&self.url("/api/scan"))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if response.ok() {
            Ok(())
        } else {
            Err(error_text(response).await)
        }
    }

    pub async fn clear_alerts(&self) -> Result<DashboardSnapshot, String> {
        let response = Request::post(&self.url("/api/alerts/clear"))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        decode(response).await
    }

    pub async fn test_alert(&self) -> Result<Alert, String> {
        let response = Request::post(&self.url("/api/alerts/test"))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        decode(response).await
    }

    pub async fn detail(&self, symbol: &str) -> Result<SymbolDetail, String> {
        let response = Request::get(&self.url(&format!("/api/detail/{symbol}")))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, String> {
    if !response.ok() {
        return Err(error_text(response).await);
    }
    response.json::<T>().await.map_err(|err| err.to_string())
}

async fn error_text(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("request failed with status {status}"),
    }
}
