//! Campus Types - Pure type definitions shared by the campus backend
//!
//! Entities are serialized with the field names the front-ends already use
//! (`_id`, camelCase, a few snake_case legacy fields).

pub mod account;
pub mod agent;
pub mod annee;
pub mod appariteur;
pub mod etudiant;
pub mod matiere;
pub mod message;
pub mod minerval;
pub mod promotion;
pub mod retrait;
pub mod section;

pub use account::*;
pub use agent::*;
pub use annee::*;
pub use appariteur::*;
pub use etudiant::*;
pub use matiere::*;
pub use message::*;
pub use minerval::*;
pub use promotion::*;
pub use retrait::*;
pub use section::*;

/// Fresh identifier for documents and nested items.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
