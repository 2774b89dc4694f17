//! Device control endpoints

use super::types::{DeviceKind, DeviceRecord, DeviceSetting, DeviceStates};
use crate::api::{ApiClient, ApiResult, RequestOptions};
use async_trait::async_trait;
use tracing::info;

const DEVICE_CONTROLS_ENDPOINT: &str = "/device-controls";

/// Anything that can report the latest device states
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn fetch_latest(&self) -> ApiResult<DeviceStates>;
}

#[derive(Clone)]
pub struct DeviceControls {
    api: ApiClient,
}

impl DeviceControls {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn latest(&self) -> ApiResult<DeviceStates> {
        let endpoint = format!("{}/latest", DEVICE_CONTROLS_ENDPOINT);
        self.api.get_json(&endpoint, RequestOptions::default()).await
    }

    /// Send a new value to one device
    pub async fn set(&self, setting: &DeviceSetting) -> ApiResult<()> {
        let kind = setting.kind();
        let endpoint = format!("{}/{}", DEVICE_CONTROLS_ENDPOINT, kind.path_segment());

        self.api
            .post(&endpoint, Some(&setting.body()), RequestOptions::default())
            .await?;

        info!(device = %kind, value = %setting.value(), "Device updated");
        Ok(())
    }

    /// Every stored record for one device
    ///
    /// The list lives at the same path the settings are posted to.
    pub async fn history(&self, kind: DeviceKind) -> ApiResult<Vec<DeviceRecord>> {
        let endpoint = format!("{}/{}", DEVICE_CONTROLS_ENDPOINT, kind.path_segment());
        self.api.get_json(&endpoint, RequestOptions::default()).await
    }
}

#[async_trait]
impl DeviceSource for DeviceControls {
    async fn fetch_latest(&self) -> ApiResult<DeviceStates> {
        self.latest().await
    }
}
