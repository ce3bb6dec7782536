//! Role SQL templates: statement splitting and placeholder substitution.
//!
//! Substitution is literal. The generated values are restricted to
//! `[a-z0-9_]`, which is what keeps them safe inside SQL text.

use zeroize::Zeroizing;

pub const NAME_TOKEN: &str = "{{name}}";
pub const PASSWORD_TOKEN: &str = "{{password}}";

/// Split on `;`, trim, and drop empty fragments.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

/// Replace every `{{key}}` with its value.
pub fn substitute(query: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(query.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), value)
    })
}

/// Split and fully substitute a template. Rendered statements may contain a
/// password, so they are wiped on drop.
pub fn render(sql: &str, vars: &[(&str, &str)]) -> Vec<Zeroizing<String>> {
    split_statements(sql)
        .into_iter()
        .map(|stmt| Zeroizing::new(substitute(stmt, vars)))
        .collect()
}
