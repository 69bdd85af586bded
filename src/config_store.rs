// src/config_store.rs
// Last-known server configuration with debounced write-back

use crate::config::{ConfigError, ServerConfig};
use crate::gateway::ServerApi;
use crate::sync::Debouncer;
use crate::view::Reporter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;

pub struct ConfigStore {
    api: Arc<dyn ServerApi>,
    current: Arc<TokioMutex<Option<ServerConfig>>>,
    debouncer: Debouncer,
    reporter: Reporter,
}

impl ConfigStore {
    pub fn new(api: Arc<dyn ServerApi>, reporter: Reporter, debounce: Duration) -> Self {
        Self {
            api,
            current: Arc::new(TokioMutex::new(None)),
            debouncer: Debouncer::new(debounce),
            reporter,
        }
    }

    /// Fetches the server config on first use, then serves the cached copy.
    pub async fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut current = self.current.lock().await;
        if let Some(config) = current.as_ref() {
            return Ok(config.clone());
        }

        let config = self.api.load_config().await?;
        tracing::info!(
            "Loaded server config: target={}, tts={}, key={}",
            config.target_language,
            config.tts_model,
            crate::config::mask_api_key(&config.api_key)
        );
        *current = Some(config.clone());
        Ok(config)
    }

    pub async fn reload(&self) -> Result<ServerConfig, ConfigError> {
        self.current.lock().await.take();
        self.load().await
    }

    pub async fn snapshot(&self) -> Option<ServerConfig> {
        self.current.lock().await.clone()
    }

    /// Changes one field locally and schedules a save of the values as
    /// they stand after this change.
    pub async fn update(&self, key: &str, raw: &str) -> Result<ServerConfig, ConfigError> {
        let updated = {
            let mut current = self.current.lock().await;
            let config = current.as_mut().ok_or(ConfigError::NotLoaded)?;
            config.set_field(key, raw)?;
            config.clone()
        };

        let api = self.api.clone();
        let reporter = self.reporter.clone();
        let pending = updated.clone();
        self.debouncer.trigger(move || async move {
            if let Err(e) = persist(api.as_ref(), &pending).await {
                reporter.error("Saving configuration failed", &e);
            } else {
                tracing::info!("Configuration saved");
            }
        });

        Ok(updated)
    }

    /// Saves immediately, dropping any pending debounced save.
    pub async fn save_now(&self) -> Result<(), ConfigError> {
        self.debouncer.cancel();
        let config = self
            .current
            .lock()
            .await
            .clone()
            .ok_or(ConfigError::NotLoaded)?;
        persist(self.api.as_ref(), &config).await
    }
}

async fn persist(api: &dyn ServerApi, config: &ServerConfig) -> Result<(), ConfigError> {
    config.validate()?;
    api.save_config(config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeServer;
    use crate::gateway::GatewayError;
    use crate::view::testing::RecordingSink;
    use crate::view::{ActivityLog, UiUpdate};

    fn server_config() -> ServerConfig {
        ServerConfig {
            group_id: "1747".into(),
            api_key: "eyJhbGciOiJSUzI1NiJ9.payload".into(),
            supported_languages: vec!["中文".into(), "英语".into(), "日语".into()],
            ..ServerConfig::default()
        }
    }

    fn store(server: Arc<FakeServer>, sink: Arc<RecordingSink>) -> ConfigStore {
        let reporter = Reporter::new(Arc::new(ActivityLog::default()), sink);
        ConfigStore::new(server, reporter, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_load_fetches_once() {
        let server = Arc::new(FakeServer::new());
        server.set_config(server_config());
        let store = store(server.clone(), Arc::new(RecordingSink::default()));

        assert_eq!(store.load().await.unwrap().group_id, "1747");
        store.load().await.unwrap();
        assert_eq!(server.calls_to("load_config"), 1);
    }

    #[tokio::test]
    async fn test_update_before_load_is_rejected() {
        let server = Arc::new(FakeServer::new());
        let store = store(server, Arc::new(RecordingSink::default()));
        assert_eq!(
            store.update("target_language", "日语").await,
            Err(ConfigError::NotLoaded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_save_once_with_final_values() {
        let server = Arc::new(FakeServer::new());
        server.set_config(server_config());
        let store = store(server.clone(), Arc::new(RecordingSink::default()));
        store.load().await.unwrap();

        store.update("target_language", "日语").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        store.update("max_segment_duration", "6").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        store.update("target_language", "中文").await.unwrap();

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(server.saved_configs().is_empty());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let saved = server.saved_configs();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].target_language, "中文");
        assert_eq!(saved[0].max_segment_duration, 6.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_reported() {
        let server = Arc::new(FakeServer::new());
        server.set_config(server_config());
        let sink = Arc::new(RecordingSink::default());
        let store = store(server.clone(), sink.clone());
        store.load().await.unwrap();

        server.fail_next("save_config", GatewayError::Transport("refused".into()));
        store.update("silence_threshold", "0.4").await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(sink.count(|u| matches!(u, UiUpdate::Notify(_))), 1);
    }

    #[tokio::test]
    async fn test_save_now_validates_first() {
        let server = Arc::new(FakeServer::new());
        server.set_config(ServerConfig::default());
        let store = store(server.clone(), Arc::new(RecordingSink::default()));
        store.load().await.unwrap();

        assert!(matches!(store.save_now().await, Err(ConfigError::Invalid(_))));
        assert_eq!(server.calls_to("save_config"), 0);
    }
}
