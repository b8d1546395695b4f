//! Student wallets: purchases and top-ups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RechargeStatut {
    Pending,
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commande {
    #[serde(rename = "_id")]
    pub id: String,
    pub product: String,
    pub montant: f64,
    #[serde(rename = "ref")]
    pub reference: String,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recharge {
    #[serde(rename = "_id")]
    pub id: String,
    pub montant: f64,
    pub statut: RechargeStatut,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub date_created: DateTime<Utc>,
}

impl Recharge {
    pub fn is_completed(&self) -> bool {
        self.statut == RechargeStatut::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    pub etudiant_id: String,
    pub solde: f64,
    #[serde(default)]
    pub frais_acad: f64,
    #[serde(default)]
    pub commandes: Vec<Commande>,
    #[serde(default)]
    pub recharges: Vec<Recharge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn total_depense(&self) -> f64 {
        self.commandes.iter().map(|c| c.montant).sum()
    }

    pub fn total_recharge(&self) -> f64 {
        self.recharges
            .iter()
            .filter(|r| r.is_completed())
            .map(|r| r.montant)
            .sum()
    }
}

/// Wallet with its derived totals, as sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub total_depense: f64,
    pub total_recharge: f64,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            total_depense: account.total_depense(),
            total_recharge: account.total_recharge(),
            account,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandeInput {
    pub product: Option<String>,
    pub montant: Option<f64>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RechargeInput {
    pub montant: Option<f64>,
    pub statut: Option<RechargeStatut>,
    pub phone: Option<String>,
}

/// A wallet purchase joined with the student who made it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandeProduit {
    #[serde(rename = "_id")]
    pub account_id: String,
    pub etudiant: crate::EtudiantBrief,
    pub commande: Commande,
}
