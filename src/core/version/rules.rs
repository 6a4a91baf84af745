// ─── Platform Rules ───
// Conditional inclusion shared by libraries and argument tokens.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::platform::{self, PlatformId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsConstraint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    /// Regex over the OS version string. Parsed, never evaluated.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsConstraint>,
    #[serde(default)]
    pub features: Option<BTreeMap<String, bool>>,
}

impl ConditionRule {
    pub fn allow() -> Self {
        Self {
            action: RuleAction::Allow,
            os: None,
            features: None,
        }
    }

    pub fn disallow() -> Self {
        Self {
            action: RuleAction::Disallow,
            os: None,
            features: None,
        }
    }

    pub fn on_os(mut self, name: &str) -> Self {
        self.os = Some(OsConstraint {
            name: Some(name.to_string()),
            ..OsConstraint::default()
        });
        self
    }

    pub fn with_feature(mut self, feature: &str, value: bool) -> Self {
        self.features
            .get_or_insert_with(BTreeMap::new)
            .insert(feature.to_string(), value);
        self
    }

    /// Whether every constraint this rule carries holds in `env`.
    /// A rule with no constraints applies everywhere.
    fn applies(&self, env: &RuleEnv) -> bool {
        let os_matches = match &self.os {
            None => true,
            Some(os) => {
                let name_ok = os
                    .name
                    .as_deref()
                    .map_or(true, |name| name == env.platform.as_str());
                let arch_ok = os.arch.as_deref().map_or(true, |arch| arch == env.arch);
                name_ok && arch_ok
            }
        };

        let features_match = match &self.features {
            None => true,
            Some(required) => required
                .iter()
                .all(|(feature, wanted)| env.features.contains(feature) == *wanted),
        };

        os_matches && features_match
    }
}

/// Everything a rule can be evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEnv {
    pub platform: PlatformId,
    pub arch: String,
    /// Enabled launcher features (`has_custom_resolution`, `is_demo_user`, ...).
    pub features: BTreeSet<String>,
}

impl RuleEnv {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            arch: platform::host_arch().to_string(),
            features: BTreeSet::new(),
        }
    }

    pub fn current() -> Self {
        Self::new(PlatformId::current())
    }

    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    pub fn with_feature(mut self, feature: &str) -> Self {
        self.features.insert(feature.to_string());
        self
    }
}

/// Left-to-right fold over `rules`: starts disallowed, every applicable
/// rule overwrites the verdict, so the last applicable rule wins.
/// `None` means the entry is unconditional.
pub fn is_allowed(rules: Option<&[ConditionRule]>, env: &RuleEnv) -> bool {
    let Some(rules) = rules else {
        return true;
    };

    let mut allowed = false;
    for rule in rules {
        if rule.applies(env) {
            allowed = rule.action == RuleAction::Allow;
        }
    }
    allowed
}

/// `is_allowed` for a bare platform with default arch and no features.
pub fn is_allowed_on(rules: Option<&[ConditionRule]>, platform: PlatformId) -> bool {
    is_allowed(rules, &RuleEnv::new(platform))
}
