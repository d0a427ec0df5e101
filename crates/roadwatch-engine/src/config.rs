//! Engine tunables that differ between deployments.

use roadwatch_core::policy::InteractionCooldownScope;

/// Name of the environment in which the per-user report cooldown applies.
pub const PRODUCTION: &str = "production";

#[derive(Debug, Clone)]
pub struct EngineConfig {
  /// Reject a report when the same user reported less than a minute ago.
  pub enforce_report_cooldown:    bool,
  pub interaction_cooldown_scope: InteractionCooldownScope,
  /// Bus channel that incident events are published on.
  pub channel:                    String,
}

impl EngineConfig {
  /// The configuration for a named deployment environment. Only
  /// `production` throttles reports.
  pub fn for_environment(environment: &str, channel: impl Into<String>) -> Self {
    Self {
      enforce_report_cooldown:    environment.eq_ignore_ascii_case(PRODUCTION),
      interaction_cooldown_scope: InteractionCooldownScope::default(),
      channel:                    channel.into(),
    }
  }
}

impl Default for EngineConfig {
  fn default() -> Self { Self::for_environment(PRODUCTION, "incidents") }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_production_enforces_report_cooldown() {
    assert!(EngineConfig::for_environment("production", "c").enforce_report_cooldown);
    assert!(EngineConfig::for_environment("PRODUCTION", "c").enforce_report_cooldown);
    assert!(!EngineConfig::for_environment("development", "c").enforce_report_cooldown);
    assert!(!EngineConfig::for_environment("", "c").enforce_report_cooldown);
  }
}
