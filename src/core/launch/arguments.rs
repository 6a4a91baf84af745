// ─── Argument Templating ───
// Expands JVM/game argument templates into a flat argument vector.

use std::collections::BTreeMap;

use crate::core::version::{is_allowed, ArgumentToken, RuleEnv};

/// Placeholder name to value, used for `${name}` substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable(BTreeMap<String, String>);

impl SubstitutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Replace every `${name}` found in the table. Unknown placeholders are
    /// kept verbatim and substituted values are not scanned again.
    pub fn substitute(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    let key = &after[..end];
                    // `${a ${b}}`: the outer opener is plain text.
                    if let Some(inner) = key.find("${") {
                        out.push_str(&rest[start..start + 2 + inner]);
                        rest = &after[inner..];
                        continue;
                    }
                    match self.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 1]),
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SubstitutionTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Expand `template` in order. Conditional tokens whose rules reject `env`
/// contribute nothing; multi-value tokens are flattened in place.
pub fn expand(template: &[ArgumentToken], env: &RuleEnv, table: &SubstitutionTable) -> Vec<String> {
    let mut out = Vec::with_capacity(template.len());
    for token in template {
        match token {
            ArgumentToken::Literal(value) => out.push(table.substitute(value)),
            ArgumentToken::Conditional { rules, value } => {
                if is_allowed(Some(rules.as_slice()), env) {
                    out.extend(value.as_slice().iter().map(|v| table.substitute(v)));
                }
            }
        }
    }
    out
}
