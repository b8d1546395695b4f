//! Student wallet balance arithmetic
//!
//! The wallet balance and the student's `infoSec.solde` always move by the
//! same delta; these functions compute it.

use campus_types::RechargeStatut;

fn credited(statut: RechargeStatut, montant: f64) -> f64 {
    if statut == RechargeStatut::Completed {
        montant
    } else {
        0.0
    }
}

/// Balance change when a top-up is created.
pub fn recharge_created(statut: RechargeStatut, montant: f64) -> f64 {
    credited(statut, montant)
}

/// Balance change when a top-up's amount and/or status change. Only completed
/// top-ups count towards the balance, so the delta is what the new state
/// credits minus what the old state credited.
pub fn recharge_updated(
    old_statut: RechargeStatut,
    old_montant: f64,
    new_statut: Option<RechargeStatut>,
    new_montant: Option<f64>,
) -> f64 {
    let statut = new_statut.unwrap_or(old_statut);
    let montant = new_montant.unwrap_or(old_montant);
    credited(statut, montant) - credited(old_statut, old_montant)
}

/// Balance change when a top-up is deleted.
pub fn recharge_deleted(statut: RechargeStatut, montant: f64) -> f64 {
    -credited(statut, montant)
}

/// Balance change when a purchase amount goes from `old` to `new`.
pub fn commande_updated(old_montant: f64, new_montant: Option<f64>) -> f64 {
    old_montant - new_montant.unwrap_or(old_montant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RechargeStatut::*;

    #[test]
    fn test_recharge_status_transitions() {
        assert_eq!(recharge_created(Completed, 50.0), 50.0);
        assert_eq!(recharge_created(Pending, 50.0), 0.0);

        // pending -> completed credits the (new or old) amount
        assert_eq!(recharge_updated(Pending, 50.0, Some(Completed), None), 50.0);
        assert_eq!(recharge_updated(Pending, 50.0, Some(Completed), Some(70.0)), 70.0);

        // completed -> failed removes the old amount
        assert_eq!(recharge_updated(Completed, 50.0, Some(Failed), None), -50.0);
        assert_eq!(recharge_updated(Completed, 50.0, Some(Failed), Some(80.0)), -50.0);

        // amount change on a completed top-up
        assert_eq!(recharge_updated(Completed, 50.0, None, Some(80.0)), 30.0);
        assert_eq!(recharge_updated(Completed, 50.0, Some(Completed), Some(40.0)), -10.0);

        // amount change on a pending top-up does not touch the balance
        assert_eq!(recharge_updated(Pending, 50.0, None, Some(80.0)), 0.0);

        assert_eq!(recharge_deleted(Completed, 50.0), -50.0);
        assert_eq!(recharge_deleted(Canceled, 50.0), 0.0);
    }

    #[test]
    fn test_commande_update() {
        assert_eq!(commande_updated(20.0, Some(25.0)), -5.0);
        assert_eq!(commande_updated(20.0, Some(15.0)), 5.0);
        assert_eq!(commande_updated(20.0, None), 0.0);
    }
}
