use std::sync::Arc;
use std::time::Duration;

use headshot_bridge::bfl::{BflClient, KONTEXT_ENDPOINT};
use headshot_bridge::bridge::{FalSubscribeBridge, KontextBridge};
use headshot_bridge::fal::FalClient;
use headshot_bridge::upload::TempFileHost;
use headshot_bridge::JobBridge;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable; every field is behind `Arc` and immutable.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Single-photo headshots (BFL Kontext, submit + poll).
    pub headshot: Arc<dyn JobBridge>,
    /// Headshots from a trained LoRA (fal subscribe).
    pub lora_headshot: Arc<dyn JobBridge>,
    /// LoRA training runs (fal subscribe).
    pub trainer: Arc<dyn JobBridge>,
    /// Direct BFL access for fire-and-forget finetuned generations.
    pub bfl: Arc<BflClient>,
    /// Temporary host for training archives.
    pub uploader: Arc<TempFileHost>,
}

impl AppState {
    /// Wire every provider client from configuration over one shared
    /// connection pool.
    pub fn from_config(config: ServerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let providers = &config.providers;

        let bfl = Arc::new(BflClient::with_client(
            http.clone(),
            &providers.bfl_api_key,
            &providers.bfl_base_url,
        ));
        let fal = Arc::new(FalClient::with_client(
            http.clone(),
            &providers.fal_key,
            &providers.fal_queue_url,
        ));
        let uploader = Arc::new(TempFileHost::with_client(http, &providers.upload_url));

        let headshot: Arc<dyn JobBridge> = Arc::new(KontextBridge::new(
            Arc::clone(&bfl),
            KONTEXT_ENDPOINT,
            providers.poll,
        ));
        let lora_headshot: Arc<dyn JobBridge> = Arc::new(FalSubscribeBridge::new(
            Arc::clone(&fal),
            &providers.fal_lora_model,
            providers.subscribe,
        ));
        let trainer: Arc<dyn JobBridge> = Arc::new(FalSubscribeBridge::new(
            fal,
            &providers.fal_training_model,
            providers.subscribe,
        ));

        Ok(Self {
            config: Arc::new(config),
            headshot,
            lora_headshot,
            trainer,
            bfl,
            uploader,
        })
    }
}
