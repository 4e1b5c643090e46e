//! `${NAME}` placeholder expansion.
//!
//! Placeholders whose variable is not set stay in the output verbatim, so a
//! missing environment variable never fails resolution. `$${` produces a
//! literal `${`.

use std::collections::BTreeMap;

use strata_types::{ConfigPath, ConfigValue, UnresolvedPlaceholder};

/// Expand placeholders in every string leaf of `tree`.
///
/// Returns the leaves that kept placeholders because their variable was
/// unset. Escaped `$${` text is literal and never reported.
pub fn interpolate_tree(
    tree: &mut ConfigValue,
    env: &BTreeMap<String, String>,
) -> Vec<UnresolvedPlaceholder> {
    let mut unresolved = Vec::new();
    tree.map_strings(&mut |path: &ConfigPath, s: &str| {
        if !s.contains('$') {
            return None;
        }
        let mut names = Vec::new();
        let expanded = expand(s, env, &mut names);
        if !names.is_empty() {
            unresolved.push(UnresolvedPlaceholder {
                path: path.clone(),
                names,
            });
        }
        Some(expanded)
    });
    unresolved
}

/// Expand placeholders in a single string.
pub fn interpolate(input: &str, env: &BTreeMap<String, String>) -> String {
    expand(input, env, &mut Vec::new())
}

fn expand(input: &str, env: &BTreeMap<String, String>, missing: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("$${") {
            out.push_str("${");
            rest = after;
            continue;
        }

        if let Some(body) = tail.strip_prefix("${") {
            if let Some(end) = body.find('}') {
                let name = &body[..end];
                if is_variable_name(name) {
                    match env.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str(&tail[..end + 3]);
                            if !missing.iter().any(|m| m == name) {
                                missing.push(name.to_string());
                            }
                        }
                    }
                    rest = &body[end + 1..];
                    continue;
                }
            }
        }

        out.push('$');
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

/// Names of placeholders in `input` that look unexpanded.
///
/// This reads the text only. It cannot tell a placeholder that survived
/// expansion from one produced by the `$${` escape, so resolved trees
/// should rely on [`ResolvedConfig::unresolved`](strata_types::ResolvedConfig).
pub fn unresolved_placeholders(input: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = input;
    while let Some(pos) = rest.find("${") {
        let escaped = pos > 0 && rest.as_bytes()[pos - 1] == b'$';
        let body = &rest[pos + 2..];
        match body.find('}') {
            Some(end) => {
                let name = &body[..end];
                if !escaped && is_variable_name(name) {
                    names.push(name);
                }
                rest = &body[end + 1..];
            }
            None => break,
        }
    }
    names
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_known_variables() {
        let env = env(&[("DB_HOST", "db.internal"), ("DB_PORT", "5432")]);
        assert_eq!(
            interpolate("postgres://${DB_HOST}:${DB_PORT}/app", &env),
            "postgres://db.internal:5432/app"
        );
    }

    #[test]
    fn leaves_unknown_variables_literal() {
        let env = env(&[]);
        assert_eq!(interpolate("${MISSING}/x", &env), "${MISSING}/x");
        assert_eq!(unresolved_placeholders("${MISSING}/x"), vec!["MISSING"]);
    }

    #[test]
    fn escapes_and_malformed_input() {
        let env = env(&[("A", "1")]);
        assert_eq!(interpolate("$${A}", &env), "${A}");
        assert!(unresolved_placeholders("$${A}").is_empty());
        assert_eq!(interpolate("cost $5 ${A", &env), "cost $5 ${A");
        assert_eq!(interpolate("${1BAD} ${A}", &env), "${1BAD} 1");
        assert_eq!(interpolate("trailing $", &env), "trailing $");
    }

    #[test]
    fn tree_expansion_touches_only_strings() {
        let mut tree = ConfigValue::from(json!({
            "url": "redis://${CACHE_HOST}",
            "hosts": ["${CACHE_HOST}", "static"],
            "port": 6379
        }));
        let unresolved = interpolate_tree(&mut tree, &env(&[("CACHE_HOST", "cache")]));
        assert!(unresolved.is_empty());
        assert_eq!(
            tree,
            ConfigValue::from(json!({
                "url": "redis://cache",
                "hosts": ["cache", "static"],
                "port": 6379
            }))
        );
    }

    #[test]
    fn tree_expansion_reports_only_unset_variables() {
        let mut tree = ConfigValue::from(json!({
            "banner": "literal $${NOT_A_VAR}",
            "api": {"url": "https://${API_HOST}/${API_HOST}/${VERSION}"},
            "hosts": ["${CACHE_HOST}", "${MISSING}"]
        }));
        let unresolved = interpolate_tree(
            &mut tree,
            &env(&[("CACHE_HOST", "cache"), ("VERSION", "v1")]),
        );

        assert_eq!(tree.get("banner"), Some(&ConfigValue::from("literal ${NOT_A_VAR}")));
        let reported: Vec<(String, Vec<String>)> = unresolved
            .into_iter()
            .map(|u| (u.path.to_string(), u.names))
            .collect();
        assert_eq!(
            reported,
            vec![
                ("api.url".to_string(), vec!["API_HOST".to_string()]),
                ("hosts.1".to_string(), vec!["MISSING".to_string()]),
            ]
        );
    }
}
