//! Tuition rules: instalment ceilings, payment admission and reports

use crate::error::{CampusError, Result};
use campus_types::{
    Etudiant, EtudiantBrief, LigneRapport, Minerval, MinervalRef, PaiementStatistiques,
    PaiementsEtudiant, RapportMinerval, StatistiquesRapport, StatutRapport,
};

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole * 100.0).round()
    } else {
        0.0
    }
}

/// Instalments may never add up to more than the tuition amount.
pub fn check_tranches_total(montant: f64, total_tranches: f64) -> Result<()> {
    if total_tranches > montant {
        return Err(CampusError::validation(
            "La somme des tranches ne peut pas dépasser le montant total du minerval",
        ));
    }
    Ok(())
}

pub fn check_new_tranche(minerval: &Minerval, montant: f64) -> Result<()> {
    check_tranches_total(minerval.montant, minerval.tranches_total() + montant)
}

/// Same ceiling when an existing instalment changes amount.
pub fn check_tranche_change(minerval: &Minerval, tranche_id: &str, montant: f64) -> Result<()> {
    let tranche = minerval
        .tranche(tranche_id)
        .ok_or_else(|| CampusError::not_found("Tranche non trouvée"))?;
    let total = minerval.tranches_total() - tranche.montant + montant;
    check_tranches_total(minerval.montant, total)
}

/// Checks a payment against the minerval before it is recorded: the student
/// must be enrolled in the minerval's promotion for its year, the instalment
/// (when given) must exist, and completed payments plus this one may not
/// exceed the tuition amount.
pub fn check_payment(
    minerval: &Minerval,
    etudiant: &Etudiant,
    montant: f64,
    tranche_id: Option<&str>,
) -> Result<()> {
    if !etudiant.is_enrolled(&minerval.promotion_id, &minerval.annee_id) {
        return Err(CampusError::validation(
            "Cet étudiant n'est pas inscrit dans cette promotion pour l'année académique spécifiée",
        ));
    }

    if let Some(tranche_id) = tranche_id {
        if minerval.tranche(tranche_id).is_none() {
            return Err(CampusError::validation("La tranche spécifiée n'existe pas"));
        }
    }

    if minerval.total_paye_etudiant(&etudiant.id) + montant > minerval.montant {
        return Err(CampusError::validation("Le montant dépasse le reste à payer"));
    }

    Ok(())
}

pub fn student_statement(minerval: &Minerval, etudiant_id: &str) -> PaiementsEtudiant {
    let total_paye = minerval.total_paye_etudiant(etudiant_id);
    PaiementsEtudiant {
        etudiant_id: etudiant_id.to_string(),
        minerval: MinervalRef::from(minerval),
        paiements: minerval.paiements_etudiant(etudiant_id),
        statistiques: PaiementStatistiques {
            total_paye,
            reste_a_payer: minerval.reste_a_payer(etudiant_id),
            pourcentage_paye: percentage(total_paye, minerval.montant),
        },
    }
}

/// Collection report over the students enrolled in the minerval's promotion
/// and year.
pub fn build_report(minerval: &Minerval, etudiants: &[Etudiant]) -> RapportMinerval {
    let details: Vec<LigneRapport> = etudiants
        .iter()
        .map(|etudiant| {
            let total_paye = minerval.total_paye_etudiant(&etudiant.id);
            let reste_a_payer = minerval.reste_a_payer(&etudiant.id);
            LigneRapport {
                etudiant_id: etudiant.id.clone(),
                etudiant: EtudiantBrief::from(etudiant),
                total_paye,
                reste_a_payer,
                pourcentage_paye: percentage(total_paye, minerval.montant),
                statut: if reste_a_payer == 0.0 {
                    StatutRapport::Complet
                } else {
                    StatutRapport::Partiel
                },
            }
        })
        .collect();

    let total_percu = minerval.total_paye();
    let total_attendu = minerval.montant * etudiants.len() as f64;
    let etudiants_a_jour = details
        .iter()
        .filter(|l| l.statut == StatutRapport::Complet)
        .count();

    RapportMinerval {
        minerval: MinervalRef::from(minerval),
        statistiques: StatistiquesRapport {
            total_etudiants: etudiants.len(),
            etudiants_a_jour,
            etudiants_partiels: details.len() - etudiants_a_jour,
            total_percu,
            total_attendu,
            pourcentage_perception: percentage(total_percu, total_attendu),
        },
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_types::{
        Actifs, Devise, InfoAcad, InfoPerso, InfoScol, InfoSec, ModePaiement, Paiement,
        StatutPaiement, Tranche,
    };
    use chrono::Utc;

    fn minerval() -> Minerval {
        Minerval {
            id: "m1".to_string(),
            promotion_id: "p1".to_string(),
            annee_id: "a1".to_string(),
            montant: 500.0,
            devise: Devise::Usd,
            description: None,
            tranches: vec![Tranche {
                id: "t1".to_string(),
                designation: "Première tranche".to_string(),
                date_fin: None,
                montant: 300.0,
            }],
            paiements: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn etudiant(id: &str, promotion_id: &str) -> Etudiant {
        Etudiant {
            id: id.to_string(),
            info_perso: InfoPerso {
                nom: "MBUYI".to_string(),
                post_nom: "KALONJI".to_string(),
                ..Default::default()
            },
            info_sec: InfoSec::default(),
            info_scol: InfoScol::default(),
            info_acad: vec![InfoAcad {
                promotion_id: promotion_id.to_string(),
                annee_id: "a1".to_string(),
                actifs: Actifs::default(),
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn paye(minerval: &mut Minerval, etudiant_id: &str, montant: f64) {
        minerval.paiements.push(Paiement {
            id: campus_types::new_id(),
            etudiant_id: etudiant_id.to_string(),
            montant,
            date_created: Utc::now(),
            reference: "PAY".to_string(),
            mode: ModePaiement::Cash,
            tranche_id: None,
            statut: StatutPaiement::Completed,
        });
    }

    #[test]
    fn test_tranche_ceiling() {
        let m = minerval();
        assert!(check_new_tranche(&m, 200.0).is_ok());
        assert!(check_new_tranche(&m, 200.01).is_err());
        assert!(check_tranche_change(&m, "t1", 500.0).is_ok());
        assert!(check_tranche_change(&m, "t1", 501.0).is_err());
        assert!(matches!(
            check_tranche_change(&m, "t9", 1.0),
            Err(CampusError::NotFound(_))
        ));
    }

    #[test]
    fn test_payment_admission() {
        let mut m = minerval();
        let inscrit = etudiant("e1", "p1");
        let ailleurs = etudiant("e2", "p2");

        assert!(check_payment(&m, &ailleurs, 10.0, None).is_err());
        assert!(check_payment(&m, &inscrit, 10.0, Some("t9")).is_err());
        assert!(check_payment(&m, &inscrit, 500.0, Some("t1")).is_ok());

        paye(&mut m, "e1", 400.0);
        assert!(check_payment(&m, &inscrit, 100.0, None).is_ok());
        assert!(check_payment(&m, &inscrit, 100.5, None).is_err());
    }

    #[test]
    fn test_statement_and_report() {
        let mut m = minerval();
        paye(&mut m, "e1", 500.0);
        paye(&mut m, "e2", 125.0);

        let statement = student_statement(&m, "e2");
        assert_eq!(statement.paiements.len(), 1);
        assert_eq!(statement.statistiques.total_paye, 125.0);
        assert_eq!(statement.statistiques.reste_a_payer, 375.0);
        assert_eq!(statement.statistiques.pourcentage_paye, 25.0);

        let etudiants = vec![etudiant("e1", "p1"), etudiant("e2", "p1")];
        let rapport = build_report(&m, &etudiants);
        assert_eq!(rapport.statistiques.total_etudiants, 2);
        assert_eq!(rapport.statistiques.etudiants_a_jour, 1);
        assert_eq!(rapport.statistiques.etudiants_partiels, 1);
        assert_eq!(rapport.statistiques.total_percu, 625.0);
        assert_eq!(rapport.statistiques.total_attendu, 1000.0);
        assert_eq!(rapport.statistiques.pourcentage_perception, 63.0);
        assert_eq!(rapport.details[0].statut, StatutRapport::Complet);
    }

    #[test]
    fn test_report_without_students() {
        let rapport = build_report(&minerval(), &[]);
        assert_eq!(rapport.statistiques.total_attendu, 0.0);
        assert_eq!(rapport.statistiques.pourcentage_perception, 0.0);
    }
}
