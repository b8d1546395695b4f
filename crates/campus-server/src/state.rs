//! Application state shared across handlers

use crate::config::Config;
use crate::handlers::ws::ConnectionManager;
use crate::services::mailer::Mailer;
use crate::services::payment::PaymentGateway;
use crate::services::{
    AccountService, AgentService, AnneeService, AppariteurService, AuthService, CsvImporter,
    EtudiantService, MatiereService, MinervalService, PromotionService, RetraitService,
    SectionService,
};
use crate::storage::{Database, MemoryCache};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub cache: Arc<MemoryCache>,
    pub annees: Arc<AnneeService>,
    pub agents: Arc<AgentService>,
    pub sections: Arc<SectionService>,
    pub promotions: Arc<PromotionService>,
    pub matieres: Arc<MatiereService>,
    pub etudiants: Arc<EtudiantService>,
    pub accounts: Arc<AccountService>,
    pub minervals: Arc<MinervalService>,
    pub retraits: Arc<RetraitService>,
    pub appariteurs: Arc<AppariteurService>,
    pub auth: Arc<AuthService>,
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<Database>,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let cache = Arc::new(MemoryCache::new(config.default_cache_ttl()));
        let importer = Arc::new(CsvImporter::new(config.imports.assets_dir.clone()));

        Self {
            annees: Arc::new(AnneeService::new(db.clone())),
            agents: Arc::new(AgentService::new(db.clone(), importer.clone())),
            sections: Arc::new(SectionService::new(db.clone(), importer.clone())),
            promotions: Arc::new(PromotionService::new(db.clone(), importer.clone())),
            matieres: Arc::new(MatiereService::new(db.clone(), importer.clone())),
            etudiants: Arc::new(EtudiantService::new(db.clone(), cache.clone(), importer)),
            accounts: Arc::new(AccountService::new(db.clone(), cache.clone(), gateway)),
            minervals: Arc::new(MinervalService::new(db.clone(), cache.clone())),
            retraits: Arc::new(RetraitService::new(db.clone(), cache.clone())),
            appariteurs: Arc::new(AppariteurService::new(db.clone())),
            auth: Arc::new(AuthService::new(db.clone(), mailer, &config)),
            connections: Arc::new(ConnectionManager::new()),
            config: Arc::new(config),
            db,
            cache,
        }
    }

    /// State over an in-memory database, a log-only mailer and no payment
    /// gateway.
    #[cfg(test)]
    pub async fn for_tests() -> Self {
        use crate::services::mailer::LogMailer;
        use crate::services::payment::DisabledGateway;

        let db = Arc::new(Database::in_memory().await.expect("in-memory database"));
        Self::new(
            Config::default(),
            db,
            Arc::new(LogMailer),
            Arc::new(DisabledGateway),
        )
    }
}
