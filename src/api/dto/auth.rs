use crate::domain::session::{AuthResponse, TokenPair};
use crate::domain::user::{Role, User};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Apple,
}

#[derive(Serialize)]
pub struct OAuthRequest<'a> {
    pub provider: OAuthProvider,
    pub id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<&'a str>,
}

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Serialize)]
pub struct ForgotPasswordRequest<'a> {
    pub email: &'a str,
}

#[derive(Serialize)]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[derive(Serialize)]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponseDto {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserDto,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponseDto {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        Self {
            id: dto.id,
            email: dto.email,
            name: dto.name,
            role: Role::parse(&dto.role),
            avatar_url: dto.avatar_url.filter(|url| !url.is_empty()),
        }
    }
}

impl From<AuthResponseDto> for AuthResponse {
    fn from(dto: AuthResponseDto) -> Self {
        Self {
            user: dto.user.into(),
            tokens: TokenPair::new(dto.access_token, dto.refresh_token),
            expires_in: dto.expires_in,
        }
    }
}

impl From<RefreshResponseDto> for TokenPair {
    fn from(dto: RefreshResponseDto) -> Self {
        Self::new(dto.access_token, dto.refresh_token)
    }
}
