//! Student authentication: one-time codes by mail, then a JWT

use super::mailer::{otp_mail, Mailer};
use crate::config::Config;
use crate::storage::Database;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use campus_core::reference::generate_otp;
use campus_core::validate::required;
use campus_core::{CampusError, Etudiant, OtpRequest, OtpVerification, Result};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e).into())
}

#[cfg(test)]
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{PasswordHash, PasswordVerifier};

    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub matricule: Option<String>,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

struct PendingOtp {
    code: String,
    etudiant_id: String,
    expires_at: Instant,
    failures: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpSent {
    pub message: String,
    pub expires_in: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    pub token: String,
    pub etudiant: Etudiant,
    pub message: String,
}

pub struct AuthService {
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
    otps: DashMap<String, PendingOtp>,
    jwt_secret: String,
    token_ttl: Duration,
    otp_ttl: std::time::Duration,
    otp_max_attempts: u32,
    production: bool,
}

impl AuthService {
    pub fn new(db: Arc<Database>, mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        Self {
            db,
            mailer,
            otps: DashMap::new(),
            jwt_secret: config.auth.jwt_secret.clone(),
            token_ttl: Duration::hours(config.auth.token_ttl_hours),
            otp_ttl: std::time::Duration::from_secs(config.auth.otp_ttl_secs),
            otp_max_attempts: config.auth.otp_max_attempts.max(1),
            production: config.is_production(),
        }
    }

    pub async fn request_otp(&self, request: OtpRequest) -> Result<OtpSent> {
        let matricule = required(request.matricule.as_deref(), "Matricule et email requis")?;
        let email = required(request.email.as_deref(), "Matricule et email requis")?.to_lowercase();

        let etudiant = self
            .db
            .etudiant_by_credentials(&matricule, &email)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé avec ces identifiants"))?;

        let code = generate_otp();
        self.otps.insert(
            matricule.clone(),
            PendingOtp {
                code: code.clone(),
                etudiant_id: etudiant.id.clone(),
                expires_at: Instant::now() + self.otp_ttl,
                failures: 0,
            },
        );
        debug!("OTP generated for {}", matricule);

        let mail = otp_mail(
            &email,
            etudiant.prenom_usuel(),
            &matricule,
            &code,
            self.production,
        );
        if let Err(e) = self.mailer.send(mail).await {
            warn!("OTP mail to {} failed: {}", email, e);
            return Err(CampusError::Mail(
                "Erreur lors de l'envoi de l'email OTP".to_string(),
            ));
        }

        info!("OTP sent to student {}", matricule);
        Ok(OtpSent {
            message: "Code OTP envoyé à votre adresse email".to_string(),
            expires_in: format!("{} minutes", self.otp_ttl.as_secs() / 60),
        })
    }

    pub async fn verify_otp(&self, verification: OtpVerification) -> Result<LoggedIn> {
        let matricule = required(verification.matricule.as_deref(), "Matricule et OTP requis")?;
        let otp = required(verification.otp.as_deref(), "Matricule et OTP requis")?;

        let etudiant_id = {
            let mut pending = self.otps.get_mut(&matricule).ok_or_else(|| {
                CampusError::unauthorized("Aucun code OTP trouvé pour ce matricule")
            })?;
            if Instant::now() > pending.expires_at {
                drop(pending);
                self.otps.remove(&matricule);
                return Err(CampusError::unauthorized("Code OTP expiré"));
            }
            if pending.code != otp {
                pending.failures += 1;
                if pending.failures >= self.otp_max_attempts {
                    drop(pending);
                    self.otps.remove(&matricule);
                    warn!("Too many wrong codes for {}, pending code dropped", matricule);
                    return Err(CampusError::unauthorized(
                        "Trop de tentatives, demandez un nouveau code OTP",
                    ));
                }
                return Err(CampusError::unauthorized("Code OTP incorrect"));
            }
            pending.etudiant_id.clone()
        };

        let etudiant: Etudiant = self
            .db
            .get(&etudiant_id)
            .await?
            .ok_or_else(|| CampusError::not_found("Étudiant non trouvé"))?;

        let token = self.issue_token(&etudiant)?;
        self.otps.remove(&matricule);
        info!("Student {} logged in", matricule);

        Ok(LoggedIn {
            token,
            message: format!("Bienvenue {}", etudiant.prenom_usuel()),
            etudiant,
        })
    }

    pub fn issue_token(&self, etudiant: &Etudiant) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: etudiant.id.clone(),
            matricule: etudiant.info_sec.etudiant_id.clone(),
            role: "etudiant".to_string(),
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e).into())
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected token: {}", e);
            CampusError::unauthorized("Token invalide ou expiré")
        })
    }

    /// Drop expired codes; returns how many were removed.
    pub fn purge_expired_otps(&self) -> usize {
        let now = Instant::now();
        let before = self.otps.len();
        self.otps.retain(|_, pending| pending.expires_at >= now);
        before - self.otps.len()
    }
}
