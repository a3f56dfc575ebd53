use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

const DEFAULT_JWT_SECRET: &str = "default-secret";
const DEFAULT_JWT_REFRESH_SECRET: &str = "default-refresh-secret";

pub struct Config;

impl Config {
    /// `ROCKET_PROFILE`, else `development` for debug builds and `release` otherwise.
    fn profile() -> String {
        env::var("ROCKET_PROFILE").unwrap_or_else(|_| {
            if cfg!(debug_assertions) { "development" } else { "release" }.to_string()
        })
    }

    fn figment() -> Figment {
        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(Self::profile().as_str())
            .merge(Env::prefixed("ROCKET_").ignore(&["PROFILE"]).global())
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string())
    }

    pub fn jwt_refresh_secret() -> String {
        Self::figment()
            .extract_inner("jwt_refresh_secret")
            .unwrap_or_else(|_| DEFAULT_JWT_REFRESH_SECRET.to_string())
    }

    /// Access token lifetime in seconds.
    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(86400)
    }

    pub fn jwt_refresh_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_refresh_expiry")
            .unwrap_or(604800)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "adopte-un-etudiant".to_string())
    }

    pub fn upload_dir() -> String {
        Self::figment()
            .extract_inner("upload_dir")
            .unwrap_or_else(|_| "uploads".to_string())
    }

    pub fn frontend_url() -> String {
        Self::figment()
            .extract_inner("frontend_url")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_port() -> u16 {
        Self::figment()
            .extract_inner("mail_port")
            .unwrap_or(587)
    }

    pub fn mail_user() -> String {
        Self::figment()
            .extract_inner("mail_user")
            .unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "Adopte un Étudiant <noreply@adopte-un-etudiant.fr>".to_string())
    }

    pub fn is_mail_enabled() -> bool {
        !Self::mail_user().is_empty() && !Self::mail_password().is_empty()
    }

    pub fn is_development() -> bool {
        Self::profile() == "development"
    }

    /// Names of the signing secrets still on their built-in fallback.
    pub fn unset_jwt_secrets() -> Vec<&'static str> {
        unset_secrets(&Self::jwt_secret(), &Self::jwt_refresh_secret())
    }
}

fn unset_secrets(access: &str, refresh: &str) -> Vec<&'static str> {
    let mut unset = Vec::new();
    if access.trim().is_empty() || access == DEFAULT_JWT_SECRET {
        unset.push("jwt_secret");
    }
    if refresh.trim().is_empty() || refresh == DEFAULT_JWT_REFRESH_SECRET {
        unset.push("jwt_refresh_secret");
    }
    unset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_rocket_toml() {
        assert!(Config::jwt_expiry() > 0);
        assert!(Config::jwt_refresh_expiry() > Config::jwt_expiry());
        assert!(!Config::database_name().is_empty());
        assert!(Config::mongodb_uri().starts_with("mongodb"));
    }

    #[test]
    fn fallback_secrets_are_reported() {
        assert_eq!(
            unset_secrets(DEFAULT_JWT_SECRET, DEFAULT_JWT_REFRESH_SECRET),
            vec!["jwt_secret", "jwt_refresh_secret"]
        );
        assert_eq!(unset_secrets("s3cr3t", " "), vec!["jwt_refresh_secret"]);
        assert!(unset_secrets("s3cr3t", "r3fr3sh").is_empty());
    }
}
