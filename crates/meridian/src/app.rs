//! Main application logic and lifecycle management.
//!
//! The `Application` struct wires the seed-file gateway, the world context,
//! and the shutdown path together: load and validate configuration, bootstrap
//! the world, run until a signal arrives, then settle gracefully.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, seed::SeedGateway, signals};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use world_core::{KeyEcho, ShutdownState, SystemClock};
use world_server::{DailyEvent, RandomService, SyncBridge, WorldContext};

/// Fully bootstrapped world node, ready to run.
pub struct Application {
    config: AppConfig,
    context: Arc<WorldContext>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, seeds
    /// and opens the data directory, and bootstraps the world context. Any
    /// fatal problem (bad config, unreadable seed data, zero map definitions)
    /// surfaces here, before the node starts serving.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(data_dir) = args.data_dir {
            config.server.data_dir = data_dir.to_string_lossy().to_string();
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let data_dir = PathBuf::from(&config.server.data_dir);
        SeedGateway::ensure_default_seed(&data_dir).await?;
        let gateway = Arc::new(SeedGateway::load(&data_dir).await?);

        let context = WorldContext::bootstrap(
            &config.to_settings_map(),
            gateway,
            Arc::new(KeyEcho),
            Arc::new(SystemClock),
            Arc::new(RandomService::new()),
            SyncBridge::standalone_channel(),
            ShutdownState::new(),
        )
        .await?;

        info!(
            "📂 Config: {} | Data: {}",
            args.config_path.display(),
            data_dir.display()
        );

        Ok(Self { config, context })
    }

    #[cfg(test)]
    pub(crate) fn context_for_tests(&self) -> &Arc<WorldContext> {
        &self.context
    }

    /// Runs the node until a shutdown signal arrives, then tears it down.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let daily_events: Vec<DailyEvent> = self.config.daily_events()?;
        self.context.start(&daily_events);

        info!("✅ Meridian world node is now running!");
        info!(
            "🌍 Node group '{}' | channel {}",
            self.config.server.node_group, self.config.server.channel_id
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::wait_for_shutdown_signal().await?;

        info!("🧹 Beginning graceful shutdown...");
        self.context.stop().await;

        let remaining = self.context.connected_sessions().len();
        if remaining > 0 {
            warn!("⚠️ {} sessions were still connected at shutdown", remaining);
        }

        info!("✅ Meridian world node shutdown complete");
        Ok(())
    }
}
