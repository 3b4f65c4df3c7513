//! Silence ACL rules checked before a proxied silence reaches an upstream.
//!
//! Rules are evaluated in order. A rule applies when the user, the target
//! upstream and the silence matchers all fall in its scope. The first
//! applicable `allow` rule ends evaluation, an applicable `block` rule
//! rejects the silence, and an applicable `requireMatcher` rule rejects it
//! unless every required matcher is present.

use karma_models::regex_util::compile_anchored;
use karma_models::{Silence, SilenceMatcher};
use regex::Regex;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::config::{AclMatcherConfig, AclRuleConfig, Config};
use crate::error::{Result, ServerError};

const ACTIONS: [&str; 3] = ["allow", "block", "requireMatcher"];

fn acl_error(reason: impl Into<String>) -> ServerError {
    ServerError::Config { reason: reason.into() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Allow,
    Block,
    RequireMatcher,
}

#[derive(Debug, Clone)]
enum TextMatch {
    Literal(String),
    Regex(Regex),
}

impl TextMatch {
    fn new(literal: &str, pattern: &str, field: &str) -> Result<Self> {
        match (literal.is_empty(), pattern.is_empty()) {
            (false, true) => Ok(Self::Literal(literal.to_string())),
            (true, false) => compile_anchored(pattern)
                .map(Self::Regex)
                .map_err(|e| acl_error(format!("invalid silence ACL {field}_re regex {pattern:?}: {e}"))),
            _ => Err(acl_error(format!(
                "silence ACL rule matcher requires exactly one of '{field}' or '{field}_re'"
            ))),
        }
    }

    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == value,
            Self::Regex(re) => re.is_match(value),
        }
    }
}

/// Matches one silence matcher.
#[derive(Debug, Clone)]
struct AclMatcher {
    name: TextMatch,
    value: TextMatch,
    is_regex: Option<bool>,
    is_equal: Option<bool>,
}

impl AclMatcher {
    fn from_config(config: &AclMatcherConfig) -> Result<Self> {
        Ok(Self {
            name: TextMatch::new(&config.name, &config.name_re, "name")?,
            value: TextMatch::new(&config.value, &config.value_re, "value")?,
            is_regex: config.is_regex,
            is_equal: config.is_equal,
        })
    }

    fn is_match(&self, matcher: &SilenceMatcher) -> bool {
        self.name.is_match(&matcher.name)
            && self.value.is_match(&matcher.value)
            && self.is_regex.is_none_or(|r| r == matcher.is_regex)
            && self.is_equal.is_none_or(|e| e == matcher.is_equal)
    }

    fn is_present(&self, silence: &Silence) -> bool {
        silence.matchers.iter().any(|m| self.is_match(m))
    }
}

#[derive(Debug, Clone)]
struct AclRule {
    action: Action,
    reason: String,
    groups: Vec<String>,
    alertmanagers: Vec<String>,
    filters: Vec<AclMatcher>,
    required: Vec<AclMatcher>,
}

impl AclRule {
    fn from_config(rule: &AclRuleConfig, config: &Config) -> Result<Self> {
        let action = match rule.action.as_str() {
            "allow" => Action::Allow,
            "block" => Action::Block,
            "requireMatcher" => Action::RequireMatcher,
            _ => {
                return Err(acl_error(format!(
                    "silence ACL rule requires 'action' to be one of {}, got {:?}",
                    ACTIONS.join(", "),
                    rule.action
                )));
            }
        };
        if rule.reason.is_empty() {
            return Err(acl_error("silence ACL rule requires 'reason' to be set"));
        }
        for group in &rule.scope.groups {
            if !config.authorization.groups.iter().any(|g| g.name == *group) {
                return Err(acl_error(format!("silence ACL rule references unknown group '{group}'")));
            }
        }
        for name in &rule.scope.alertmanagers {
            if !config.alertmanager.servers.iter().any(|s| s.name == *name) {
                return Err(acl_error(format!("silence ACL rule references unknown alertmanager '{name}'")));
            }
        }
        if action == Action::RequireMatcher && rule.matchers.required.is_empty() {
            return Err(acl_error("silence ACL rule with 'requireMatcher' action needs 'matchers.required'"));
        }

        Ok(Self {
            action,
            reason: rule.reason.clone(),
            groups: rule.scope.groups.clone(),
            alertmanagers: rule.scope.alertmanagers.clone(),
            filters: rule
                .scope
                .filters
                .iter()
                .map(AclMatcher::from_config)
                .collect::<Result<_>>()?,
            required: rule
                .matchers
                .required
                .iter()
                .map(AclMatcher::from_config)
                .collect::<Result<_>>()?,
        })
    }

    fn in_scope(&self, user: &AuthUser, alertmanager: &str, silence: &Silence) -> bool {
        let groups = self.groups.is_empty() || self.groups.iter().any(|g| user.groups.contains(g));
        let alertmanagers = self.alertmanagers.is_empty() || self.alertmanagers.iter().any(|a| a == alertmanager);
        let filters = self.filters.iter().all(|f| f.is_present(silence));
        groups && alertmanagers && filters
    }
}

/// Ordered silence ACL rules.
#[derive(Debug, Clone, Default)]
pub struct SilenceAcl {
    rules: Vec<AclRule>,
}

impl SilenceAcl {
    /// Builds and validates `silences.acl.rules`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let rules = config
            .silences
            .acl
            .rules
            .iter()
            .map(|rule| AclRule::from_config(rule, config))
            .collect::<Result<Vec<_>>>()?;
        if !rules.is_empty() {
            info!(rules = rules.len(), "Loaded silence ACL rules");
        }
        Ok(Self { rules })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks whether `user` may send `silence` to `alertmanager`.
    pub fn check(&self, user: &AuthUser, alertmanager: &str, silence: &Silence) -> Result<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.in_scope(user, alertmanager, silence) {
                continue;
            }
            debug!(rule = index, action = ?rule.action, username = %user.username, "Silence ACL rule applies");
            match rule.action {
                Action::Allow => return Ok(()),
                Action::Block => {
                    return Err(ServerError::AclBlocked {
                        reason: rule.reason.clone(),
                    });
                }
                Action::RequireMatcher => {
                    if !rule.required.iter().all(|r| r.is_present(silence)) {
                        return Err(ServerError::AclBlocked {
                            reason: rule.reason.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AclMatchersConfig, AclScopeConfig, AlertmanagerServer, AuthorizationGroup};

    fn config(rules: Vec<AclRuleConfig>) -> Config {
        let mut config = Config::default();
        config.alertmanager.servers = ["prod", "dev"]
            .iter()
            .map(|name| AlertmanagerServer {
                name: (*name).to_string(),
                uri: format!("http://{name}:9093"),
                ..Default::default()
            })
            .collect();
        config.authorization.groups = vec![AuthorizationGroup {
            name: "admins".to_string(),
            members: vec!["alice".to_string()],
        }];
        config.silences.acl.rules = rules;
        config
    }

    fn matcher(name: &str, value: &str) -> AclMatcherConfig {
        AclMatcherConfig {
            name: name.to_string(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    fn rule(action: &str, reason: &str) -> AclRuleConfig {
        AclRuleConfig {
            action: action.to_string(),
            reason: reason.to_string(),
            ..Default::default()
        }
    }

    fn user(name: &str, groups: &[&str]) -> AuthUser {
        AuthUser {
            username: name.to_string(),
            groups: groups.iter().map(ToString::to_string).collect(),
        }
    }

    fn silence(matchers: Vec<SilenceMatcher>) -> Silence {
        Silence {
            matchers,
            ..Default::default()
        }
    }

    #[test]
    fn admins_allowed_everyone_else_blocked() {
        let mut allow = rule("allow", "admins can do anything");
        allow.scope.groups = vec!["admins".to_string()];
        let acl = SilenceAcl::from_config(&config(vec![allow, rule("block", "only admins can silence")])).unwrap();

        let s = silence(vec![SilenceMatcher::equal("alertname", "Down")]);
        assert!(acl.check(&user("alice", &["admins"]), "prod", &s).is_ok());
        let err = acl.check(&user("bob", &[]), "prod", &s).unwrap_err();
        assert_eq!(err.to_string(), "silence blocked by ACL rule: only admins can silence");
    }

    #[test]
    fn scope_by_alertmanager_and_filters() {
        let mut block = rule("block", "no cluster wide silences in prod");
        block.scope = AclScopeConfig {
            groups: Vec::new(),
            alertmanagers: vec!["prod".to_string()],
            filters: vec![AclMatcherConfig {
                name: "cluster".to_string(),
                value_re: ".+".to_string(),
                ..Default::default()
            }],
        };
        let acl = SilenceAcl::from_config(&config(vec![block])).unwrap();
        let anyone = user("bob", &[]);

        let cluster_only = silence(vec![SilenceMatcher::equal("cluster", "prod")]);
        assert!(acl.check(&anyone, "prod", &cluster_only).is_err());
        assert!(acl.check(&anyone, "dev", &cluster_only).is_ok());
        let narrow = silence(vec![SilenceMatcher::equal("instance", "web1")]);
        assert!(acl.check(&anyone, "prod", &narrow).is_ok());
    }

    #[test]
    fn require_matcher() {
        let mut require = rule("requireMatcher", "silences must target an instance");
        require.matchers = AclMatchersConfig {
            required: vec![AclMatcherConfig {
                name: "instance".to_string(),
                value_re: ".+".to_string(),
                is_regex: Some(false),
                ..Default::default()
            }],
        };
        let acl = SilenceAcl::from_config(&config(vec![require])).unwrap();
        let anyone = user("bob", &[]);

        assert!(acl
            .check(&anyone, "prod", &silence(vec![SilenceMatcher::equal("instance", "web1")]))
            .is_ok());
        assert!(acl
            .check(&anyone, "prod", &silence(vec![SilenceMatcher::regex("instance", "web.*")]))
            .is_err());
        assert!(acl.check(&anyone, "prod", &silence(Vec::new())).is_err());
    }

    #[test]
    fn no_rules_allow_everything() {
        let acl = SilenceAcl::from_config(&config(Vec::new())).unwrap();
        assert!(acl.is_empty());
        assert!(acl.check(&AuthUser::default(), "prod", &silence(Vec::new())).is_ok());
    }

    mod validation_tests {
        use super::*;

        fn invalid(rule: AclRuleConfig) -> String {
            SilenceAcl::from_config(&config(vec![rule])).unwrap_err().to_string()
        }

        #[test]
        fn action_and_reason() {
            assert!(invalid(rule("deny", "x")).contains("'action' to be one of allow, block, requireMatcher"));
            assert!(invalid(rule("block", "")).contains("'reason'"));
            assert!(invalid(rule("requireMatcher", "x")).contains("matchers.required"));
        }

        #[test]
        fn unknown_references() {
            let mut r = rule("block", "x");
            r.scope.groups = vec!["devs".to_string()];
            assert!(invalid(r).contains("unknown group 'devs'"));

            let mut r = rule("block", "x");
            r.scope.alertmanagers = vec!["staging".to_string()];
            assert!(invalid(r).contains("unknown alertmanager 'staging'"));
        }

        #[test]
        fn matcher_fields() {
            let mut r = rule("block", "x");
            r.scope.filters = vec![AclMatcherConfig {
                name: "a".to_string(),
                name_re: "a".to_string(),
                value: "b".to_string(),
                ..Default::default()
            }];
            assert!(invalid(r).contains("exactly one of 'name' or 'name_re'"));

            let mut r = rule("block", "x");
            r.scope.filters = vec![matcher("a", "")];
            assert!(invalid(r).contains("exactly one of 'value' or 'value_re'"));

            let mut r = rule("block", "x");
            r.scope.filters = vec![AclMatcherConfig {
                name: "a".to_string(),
                value_re: "((".to_string(),
                ..Default::default()
            }];
            assert!(invalid(r).contains("value_re"));
        }
    }
}
