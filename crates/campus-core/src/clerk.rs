//! Section clerk (appariteur) balance rules

use crate::error::{CampusError, Result};
use campus_types::StatutValidation;

/// Balance change when a subscription moves from `previous` to `next`: an
/// accepted subscription earns the inscription amount, losing the acceptance
/// takes it back.
pub fn souscription_delta(previous: StatutValidation, next: StatutValidation, montant: f64) -> f64 {
    match (previous == StatutValidation::Ok, next == StatutValidation::Ok) {
        (false, true) => montant,
        (true, false) => -montant,
        _ => 0.0,
    }
}

/// Balance change when a payout moves from `previous` to `next`. Payouts are
/// debited when requested; a rejected (`NO`) payout gives the money back.
pub fn retrait_delta(previous: StatutValidation, next: StatutValidation, montant: f64) -> f64 {
    match (previous == StatutValidation::No, next == StatutValidation::No) {
        (false, true) => montant,
        (true, false) => -montant,
        _ => 0.0,
    }
}

pub fn ensure_balance(balance: f64, montant: f64) -> Result<()> {
    if montant > balance {
        return Err(CampusError::InsufficientBalance(format!(
            "Solde insuffisant: {} demandé, {} disponible",
            montant, balance
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatutValidation::*;

    #[test]
    fn test_souscription_transitions() {
        assert_eq!(souscription_delta(EnAttente, Ok, 10.0), 10.0);
        assert_eq!(souscription_delta(Ok, Ok, 10.0), 0.0);
        assert_eq!(souscription_delta(Ok, No, 10.0), -10.0);
        assert_eq!(souscription_delta(No, EnAttente, 10.0), 0.0);
    }

    #[test]
    fn test_retrait_transitions() {
        assert_eq!(retrait_delta(EnAttente, No, 25.0), 25.0);
        assert_eq!(retrait_delta(No, Ok, 25.0), -25.0);
        assert_eq!(retrait_delta(EnAttente, Ok, 25.0), 0.0);
    }

    #[test]
    fn test_balance_guard() {
        assert!(ensure_balance(100.0, 100.0).is_ok());
        assert!(matches!(
            ensure_balance(100.0, 100.5),
            Err(CampusError::InsufficientBalance(_))
        ));
    }
}
