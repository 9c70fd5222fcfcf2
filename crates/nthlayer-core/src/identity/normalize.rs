//! Name normalization. Idempotent: `normalize(normalize(x)) == normalize(x)`.

/// Environment markers stripped from the end of a name.
const ENV_SUFFIXES: &[&str] = &["prod", "production", "staging", "stage", "dev", "qa", "uat", "test"];

/// Type affixes used to generate match variants. These are NOT stripped
/// during canonicalization ("pay-api" stays "pay-api"); they only widen the
/// candidate set during normalized-name matching.
const TYPE_AFFIXES: &[&str] = &["service", "svc", "api", "srv", "app"];

/// Normalize a raw service identifier into canonical form: lowercase,
/// `-`-separated, environment and version suffixes stripped, Java-style
/// package prefixes dropped.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    // Java-style package path: keep the leaf segment.
    let leaf = strip_package_prefix(trimmed);

    // CamelCase boundaries become separators before lowercasing.
    let mut out = String::with_capacity(leaf.len() + 4);
    let mut prev_lower = false;
    for ch in leaf.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('-');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_lowercase());
    }

    // Separator unification.
    let mut collapsed = String::with_capacity(out.len());
    let mut last_dash = true;
    for ch in out.chars() {
        let mapped = if ch == '.' || ch == '_' || ch == '-' { '-' } else { ch };
        if mapped == '-' {
            if !last_dash {
                collapsed.push('-');
            }
            last_dash = true;
        } else {
            collapsed.push(mapped);
            last_dash = false;
        }
    }
    let mut name = collapsed.trim_matches('-').to_string();

    // Peel environment and version suffixes in any order until stable.
    loop {
        let before = name.clone();
        name = strip_suffix_token(&name, |token| ENV_SUFFIXES.contains(&token));
        name = strip_suffix_token(&name, is_version_token);
        if name == before {
            break;
        }
    }

    name
}

/// Match variants of a normalized name with common type affixes stripped or
/// appended. The input itself is always the first variant.
pub fn affix_variants(normalized: &str) -> Vec<String> {
    let mut variants = vec![normalized.to_string()];
    for affix in TYPE_AFFIXES {
        let suffix = format!("-{affix}");
        if let Some(stem) = normalized.strip_suffix(suffix.as_str()) {
            if !stem.is_empty() && !variants.iter().any(|v| v == stem) {
                variants.push(stem.to_string());
            }
        }
        let prefix = format!("{affix}-");
        if let Some(stem) = normalized.strip_prefix(prefix.as_str()) {
            if !stem.is_empty() && !variants.iter().any(|v| v == stem) {
                variants.push(stem.to_string());
            }
        }
    }
    // Affixed forms, so "payments" also matches "payments-service".
    for affix in TYPE_AFFIXES {
        let appended = format!("{normalized}-{affix}");
        if !variants.iter().any(|v| v == &appended) {
            variants.push(appended);
        }
    }
    variants
}

/// Drop a dotted package prefix when the name looks like
/// `com.example.payments.PaymentService`.
fn strip_package_prefix(raw: &str) -> &str {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() < 3 {
        return raw;
    }
    let prefix_is_package = segments[..segments.len() - 1]
        .iter()
        .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    if prefix_is_package {
        segments[segments.len() - 1]
    } else {
        raw
    }
}

/// Strip the last `-token` when the predicate accepts it and a stem remains.
fn strip_suffix_token(name: &str, accept: impl Fn(&str) -> bool) -> String {
    if let Some((stem, token)) = name.rsplit_once('-') {
        if !stem.is_empty() && accept(token) {
            return stem.to_string();
        }
    }
    name.to_string()
}

/// `v1`, `v2`, `v10` style version tokens.
fn is_version_token(token: &str) -> bool {
    token.len() >= 2
        && token.starts_with('v')
        && token[1..].chars().all(|c| c.is_ascii_digit())
}
