use crate::auth::{AuthManager, CredentialStore, FileCredentialStore, PgCredentialStore};
use crate::clock::Clock;
use crate::config::{AppConfig, StoreConfig};
use crate::meals::{FileHistoryStore, HistoryStore, PgHistoryStore};
use crate::settings::SessionRegistry;
use crate::vision::VisionAnalyzer;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthManager,
    pub history: Arc<dyn HistoryStore>,
    pub analyzer: Arc<VisionAnalyzer>,
    pub sessions: Arc<SessionRegistry>,
    pub clock: Clock,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (credentials, history): (Arc<dyn CredentialStore>, Arc<dyn HistoryStore>) =
            match &config.store {
                StoreConfig::Files { data_dir } => {
                    info!(dir = %data_dir.display(), "using file stores");
                    (
                        Arc::new(FileCredentialStore::new(data_dir.join("users.json"))),
                        Arc::new(FileHistoryStore::new(data_dir.join("history.json"))),
                    )
                }
                StoreConfig::Postgres { database_url } => {
                    info!("using postgres stores");
                    let db = crate::db::connect(database_url).await?;
                    (
                        Arc::new(PgCredentialStore::new(db.clone())),
                        Arc::new(PgHistoryStore::new(db)),
                    )
                }
            };

        let analyzer = Arc::new(VisionAnalyzer::from_config(&config.vision)?);

        Ok(Self::from_parts(config, credentials, history, analyzer))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        credentials: Arc<dyn CredentialStore>,
        history: Arc<dyn HistoryStore>,
        analyzer: Arc<VisionAnalyzer>,
    ) -> Self {
        Self {
            clock: Clock::new(config.utc_offset),
            config,
            auth: AuthManager::new(credentials),
            history,
            analyzer,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }

    /// File stores under `dir` and a model that always answers `reply`.
    #[cfg(test)]
    pub fn fake(dir: &std::path::Path, reply: &str) -> Self {
        use crate::config::{JwtConfig, VerdictPolicy, VisionConfig};
        use crate::vision::VisionModel;
        use async_trait::async_trait;

        struct FakeModel(String);
        #[async_trait]
        impl VisionModel for FakeModel {
            fn name(&self) -> &str {
                "fake"
            }
            async fn complete(&self, _instruction: &str, _png_b64: &str) -> anyhow::Result<String> {
                Ok(self.0.clone())
            }
        }

        let config = Arc::new(AppConfig {
            store: StoreConfig::Files {
                data_dir: dir.to_path_buf(),
            },
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_minutes: 5,
            },
            vision: VisionConfig::default(),
            verdict: VerdictPolicy::default(),
            utc_offset: time::UtcOffset::UTC,
        });

        let analyzer = Arc::new(VisionAnalyzer::new(Arc::new(FakeModel(reply.into())), 512));
        Self::from_parts(
            config,
            Arc::new(FileCredentialStore::new(dir.join("users.json"))),
            Arc::new(FileHistoryStore::new(dir.join("history.json"))),
            analyzer,
        )
    }
}
