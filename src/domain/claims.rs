use serde::{Deserialize, Deserializer};

/// Claims read from an access token payload. The client never verifies the
/// signature; these are only used for session-lifetime decisions.
///
/// Identity claims are read leniently: issuers emit `role` as a single string
/// or as an array for users with several roles, and `nameid` as a string or
/// a number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nameid: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub role: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(role)) => vec![role],
        Some(OneOrMany::Many(roles)) => roles,
        None => Vec::new(),
    })
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::String(value)) => Some(value),
        Some(StringOrNumber::Number(value)) => Some(value.to_string()),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_accepts_string_or_array() {
        let single: JwtClaims = serde_json::from_str(r#"{"role":"Admin"}"#).unwrap();
        assert_eq!(single.role, vec!["Admin".to_string()]);

        let many: JwtClaims = serde_json::from_str(r#"{"role":["Admin","Owner"]}"#).unwrap();
        assert_eq!(many.role, vec!["Admin".to_string(), "Owner".to_string()]);

        let missing: JwtClaims = serde_json::from_str(r#"{"role":null}"#).unwrap();
        assert!(missing.role.is_empty());
    }

    #[test]
    fn test_numeric_nameid() {
        let claims: JwtClaims = serde_json::from_str(r#"{"nameid":42,"exp":1}"#).unwrap();
        assert_eq!(claims.nameid.as_deref(), Some("42"));
        assert_eq!(claims.exp, Some(1));
    }
}
