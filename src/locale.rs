/// Locale used when neither a stored preference nor the environment yields one.
pub const FALLBACK_LOCALE: &str = "en";

/// Normalizes POSIX and BCP 47 style locale strings into `ll` or `ll-RR`.
///
/// `en_US.UTF-8` becomes `en-US`, `pt-br` becomes `pt-BR`, `C` and `POSIX`
/// carry no language and yield `None`.
#[must_use]
pub fn normalize_locale(raw: &str) -> Option<String> {
    let without_encoding = raw.split(['.', '@']).next().unwrap_or_default().trim();
    if without_encoding.is_empty() || without_encoding.eq_ignore_ascii_case("c") || without_encoding.eq_ignore_ascii_case("posix")
    {
        return None;
    }

    let mut parts = without_encoding.split(['_', '-']);
    let language = parts.next()?.to_ascii_lowercase();
    if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    match parts.next() {
        Some(region) if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) => {
            Some(format!("{language}-{}", region.to_ascii_uppercase()))
        }
        _ => Some(language),
    }
}

/// Picks the first usable locale from the usual environment variables.
#[must_use]
pub fn detect_locale<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .find_map(normalize_locale)
        .unwrap_or_else(|| FALLBACK_LOCALE.to_string())
}

/// Reads `LC_ALL`, `LC_MESSAGES` and `LANG` in that order.
#[must_use]
pub fn detect_locale_from_env() -> String {
    let vars: Vec<Option<String>> =
        ["LC_ALL", "LC_MESSAGES", "LANG"].iter().map(|k| std::env::var(k).ok()).collect();
    detect_locale(vars.iter().map(Option::as_deref))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_variants() {
        assert_eq!(normalize_locale("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(normalize_locale("pt-br").as_deref(), Some("pt-BR"));
        assert_eq!(normalize_locale("ES").as_deref(), Some("es"));
        assert_eq!(normalize_locale("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(normalize_locale("zh-Hant-TW").as_deref(), Some("zh"));
        assert_eq!(normalize_locale("C.UTF-8"), None);
        assert_eq!(normalize_locale("POSIX"), None);
        assert_eq!(normalize_locale(""), None);
        assert_eq!(normalize_locale("12_34"), None);
    }

    #[test]
    fn test_detect_uses_first_valid_candidate() {
        assert_eq!(detect_locale([None, Some("C"), Some("fr_FR.UTF-8")]), "fr-FR");
        assert_eq!(detect_locale([None, None]), FALLBACK_LOCALE);
    }
}
