//! Business logic services

pub mod account;
pub mod agent;
pub mod annee;
pub mod appariteur;
pub mod auth;
pub mod etudiant;
pub mod imports;
pub mod mailer;
pub mod matiere;
pub mod minerval;
pub mod payment;
pub mod promotion;
pub mod retrait;
pub mod section;

pub use account::AccountService;
pub use agent::AgentService;
pub use annee::AnneeService;
pub use appariteur::AppariteurService;
pub use auth::AuthService;
pub use etudiant::EtudiantService;
pub use imports::CsvImporter;
pub use matiere::MatiereService;
pub use minerval::MinervalService;
pub use promotion::PromotionService;
pub use retrait::RetraitService;
pub use section::SectionService;
