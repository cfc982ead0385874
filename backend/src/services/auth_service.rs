use crate::auth::{hash_password, verify_password, TokenService};
use crate::error::{AppError, AppResult};
use crate::geo::GeoPoint;
use crate::models::wallet::SIGNUP_BONUS_POINTS;
use crate::models::{ServiceProvider, ServiceType, User, UserRole};
use crate::repositories::{NewProvider, NewUser, ProviderRepository, UserRepository, UserUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    // Helper-only fields
    pub service: Option<String>,
    pub location: Option<String>,
    pub experience: Option<i32>,
    pub price_per_hour: Option<Decimal>,
    pub description: Option<String>,
    pub business_name: Option<String>,
    pub is_emergency_provider: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// Token plus the account it was issued for
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ServiceProvider>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ServiceProvider>,
}

fn required(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate the request and build the rows to insert. Pure; no database access.
pub fn validate_registration(
    req: &RegisterRequest,
    password_hash: String,
) -> AppResult<(NewUser, Option<NewProvider>)> {
    let name = required(Some(&req.name))
        .ok_or_else(|| AppError::Validation("Name is required".into()))?;

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }

    let role = match req.role.as_deref() {
        None => UserRole::User,
        Some(r) => UserRole::from_str(r).map_err(AppError::Validation)?,
    };
    if role == UserRole::Admin {
        return Err(AppError::Validation(
            "Admin accounts cannot be self-registered".into(),
        ));
    }

    if let (Some(lat), Some(lon)) = (req.latitude, req.longitude) {
        GeoPoint::new(lat, lon).map_err(AppError::Validation)?;
    }

    let provider = if role == UserRole::Helper {
        let service = required(req.service.as_deref());
        let location = required(req.location.as_deref());
        let (service, location, experience, price) =
            match (service, location, req.experience, req.price_per_hour) {
                (Some(s), Some(l), Some(e), Some(p)) => (s, l, e, p),
                _ => {
                    return Err(AppError::Validation(
                        "Helpers must provide service, location, experience and pricePerHour"
                            .into(),
                    ))
                }
            };

        let service_type = ServiceType::from_str(&service).map_err(AppError::Validation)?;
        if experience < 0 {
            return Err(AppError::Validation("Experience cannot be negative".into()));
        }
        if price <= Decimal::ZERO {
            return Err(AppError::Validation("pricePerHour must be positive".into()));
        }

        Some(NewProvider {
            business_name: required(req.business_name.as_deref()).unwrap_or_else(|| name.clone()),
            service_type: service_type.as_str().to_string(),
            description: req.description.clone(),
            experience_years: experience,
            price_per_hour: price,
            city: location,
            address: req.address.clone(),
            latitude: req.latitude,
            longitude: req.longitude,
            service_radius_km: 10.0,
            is_emergency_provider: req
                .is_emergency_provider
                .unwrap_or(service_type == ServiceType::Ambulance),
        })
    } else {
        None
    };

    let user = NewUser {
        name,
        email,
        phone: req.phone.clone(),
        password_hash,
        role: role.as_str().to_string(),
        address: req.address.clone(),
        city: req.city.clone().or_else(|| provider.as_ref().map(|p| p.city.clone())),
        latitude: req.latitude,
        longitude: req.longitude,
    };

    Ok((user, provider))
}

/// Registration, login and profile management
pub struct AuthService {
    user_repo: Arc<UserRepository>,
    provider_repo: Arc<ProviderRepository>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<UserRepository>,
        provider_repo: Arc<ProviderRepository>,
        tokens: TokenService,
    ) -> Self {
        Self {
            user_repo,
            provider_repo,
            tokens,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<AuthResponse> {
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let (new_user, new_provider) = validate_registration(&req, String::new())?;

        if self.user_repo.email_exists(&new_user.email).await? {
            return Err(AppError::Conflict("Email is already registered".into()));
        }

        let new_user = NewUser {
            password_hash: hash_password(&req.password)?,
            ..new_user
        };

        let (user, provider) = self
            .user_repo
            .create_account(&new_user, new_provider.as_ref(), SIGNUP_BONUS_POINTS)
            .await?;

        info!("Registered {} account {}", user.role, user.id);

        let token = self.tokens.issue(user.id, user.role_enum())?;
        Ok(AuthResponse {
            token,
            user,
            provider,
        })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .user_repo
            .find_by_email(req.email.trim())
            .await?
            .filter(|u| verify_password(&req.password, &u.password_hash))
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".into()));
        }

        let provider = if user.is_helper() {
            self.provider_repo.find_by_user(user.id).await?
        } else {
            None
        };

        let token = self.tokens.issue(user.id, user.role_enum())?;
        Ok(AuthResponse {
            token,
            user,
            provider,
        })
    }

    pub async fn me(&self, user_id: uuid::Uuid) -> AppResult<Profile> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let provider = if user.is_helper() {
            self.provider_repo.find_by_user(user.id).await?
        } else {
            None
        };

        Ok(Profile { user, provider })
    }

    pub async fn update_profile(
        &self,
        user_id: uuid::Uuid,
        req: UpdateProfileRequest,
    ) -> AppResult<User> {
        if matches!(req.name.as_deref(), Some(n) if n.trim().is_empty()) {
            return Err(AppError::Validation("Name cannot be empty".into()));
        }

        let update = UserUpdate {
            name: req.name.map(|n| n.trim().to_string()),
            phone: req.phone,
            address: req.address,
            city: req.city,
        };
        Ok(self.user_repo.update_profile(user_id, &update).await?)
    }

    pub async fn update_location(
        &self,
        user_id: uuid::Uuid,
        req: UpdateLocationRequest,
    ) -> AppResult<User> {
        let point = GeoPoint::new(req.latitude, req.longitude).map_err(AppError::Validation)?;
        Ok(self
            .user_repo
            .update_location(user_id, point.lat, point.lon)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper_request() -> RegisterRequest {
        RegisterRequest {
            name: "Asha".into(),
            email: "Asha@Example.com".into(),
            password: "secret123".into(),
            phone: None,
            role: Some("helper".into()),
            address: None,
            city: None,
            latitude: Some(28.6),
            longitude: Some(77.2),
            service: Some("plumbing".into()),
            location: Some("Delhi".into()),
            experience: Some(4),
            price_per_hour: Some(Decimal::new(400, 0)),
            description: None,
            business_name: None,
            is_emergency_provider: None,
        }
    }

    #[test]
    fn test_helper_registration_builds_provider() {
        let (user, provider) = validate_registration(&helper_request(), "h".into()).unwrap();
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(user.role, "helper");
        assert_eq!(user.city.as_deref(), Some("Delhi"));
        let provider = provider.unwrap();
        assert_eq!(provider.service_type, "plumbing");
        assert_eq!(provider.business_name, "Asha");
        assert!(!provider.is_emergency_provider);
    }

    #[test]
    fn test_helper_missing_fields_rejected() {
        let cases: [fn(&mut RegisterRequest); 4] = [
            |r| r.service = None,
            |r| r.location = None,
            |r| r.experience = None,
            |r| r.price_per_hour = None,
        ];
        for mutate in cases {
            let mut req = helper_request();
            mutate(&mut req);
            let err = validate_registration(&req, "h".into()).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn test_helper_city_does_not_replace_location() {
        let mut req = helper_request();
        req.location = None;
        req.city = Some("Pune".into());
        assert!(matches!(
            validate_registration(&req, "h".into()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_admin_self_registration_rejected() {
        let mut req = helper_request();
        req.role = Some("admin".into());
        assert!(validate_registration(&req, "h".into()).is_err());
    }

    #[test]
    fn test_plain_user_needs_no_provider_fields() {
        let mut req = helper_request();
        req.role = None;
        req.service = None;
        req.experience = None;
        let (user, provider) = validate_registration(&req, "h".into()).unwrap();
        assert_eq!(user.role, "user");
        assert!(provider.is_none());
    }
}
