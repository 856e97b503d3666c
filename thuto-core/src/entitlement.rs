//! Plan entitlements and the capability policy table.
//!
//! The subscription provider is an external oracle. The pipeline only ever
//! asks it two questions, "is the caller on plan X" and "does the caller's
//! plan carry feature flag Y", through the [`Entitlement`] trait. Every
//! tier-to-capability decision lives in [`Capability::granted_by`] and
//! [`companion_limit`] so gated operations never repeat the conditionals.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Feature flag carried by the Free plan.
pub const FEATURE_3_COMPANION_LIMIT: &str = "3_companion_limit";
/// Feature flag carried by the Core plan.
pub const FEATURE_10_COMPANION_LIMIT: &str = "10_companion_limit";

/// Companion limit for callers without a limit feature.
pub const DEFAULT_COMPANION_LIMIT: usize = 3;
/// Companion limit granted by [`FEATURE_10_COMPANION_LIMIT`].
pub const CORE_COMPANION_LIMIT: usize = 10;

/// Subscription tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Core,
    Pro,
}

impl Tier {
    /// Plan identifier as known by the subscription provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Core => "core",
            Tier::Pro => "pro",
        }
    }

    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Core => "Core",
            Tier::Pro => "Pro",
        }
    }

    /// Feature flags this tier carries.
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Tier::Free => &[FEATURE_3_COMPANION_LIMIT],
            Tier::Core => &[FEATURE_10_COMPANION_LIMIT],
            Tier::Pro => &[],
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "core" => Ok(Tier::Core),
            "pro" => Ok(Tier::Pro),
            _ => Err(format!("unknown plan: {}", s)),
        }
    }
}

/// Boolean capability checks answered by the subscription provider for the
/// calling identity.
pub trait Entitlement: Send + Sync {
    /// Whether the caller is subscribed to `tier`.
    fn has_plan(&self, tier: Tier) -> bool;

    /// Whether the caller's plan carries the named feature flag.
    fn has_feature(&self, flag: &str) -> bool;
}

/// Static entitlement for a known tier.
///
/// Used by the CLI and tests, where the tier is supplied directly rather than
/// looked up from a billing provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanEntitlement {
    tier: Tier,
}

impl PlanEntitlement {
    pub fn new(tier: Tier) -> Self {
        Self { tier }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }
}

impl Entitlement for PlanEntitlement {
    fn has_plan(&self, tier: Tier) -> bool {
        // Free is implicit; only paid plans are reported as subscriptions
        tier != Tier::Free && tier == self.tier
    }

    fn has_feature(&self, flag: &str) -> bool {
        self.tier.features().contains(&flag)
    }
}

/// Gated product capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Saved transcripts and live statistics
    ConversationHistory,
    /// Building and listing monthly reports
    MonthlyReports,
    /// The performance dashboard
    PerformanceDashboard,
    /// Saving and reading reminder settings
    Reminders,
    /// Authoring companions beyond the plan's limit
    AdditionalCompanions,
}

impl Capability {
    /// The policy table: whether an entitlement grants this capability.
    pub fn granted_by(&self, entitlement: &dyn Entitlement) -> bool {
        match self {
            Capability::ConversationHistory | Capability::MonthlyReports => {
                entitlement.has_plan(Tier::Pro)
                    || entitlement.has_feature(FEATURE_10_COMPANION_LIMIT)
            }
            Capability::PerformanceDashboard
            | Capability::Reminders
            | Capability::AdditionalCompanions => entitlement.has_plan(Tier::Pro),
        }
    }

    /// Short description used in error messages
    pub fn description(&self) -> &'static str {
        match self {
            Capability::ConversationHistory => "conversation history",
            Capability::MonthlyReports => "monthly reports",
            Capability::PerformanceDashboard => "performance dashboard",
            Capability::Reminders => "learning reminders",
            Capability::AdditionalCompanions => "companion limit reached",
        }
    }

    /// What the caller has to do to get access
    pub fn upgrade_hint(&self) -> &'static str {
        match self {
            Capability::ConversationHistory | Capability::MonthlyReports => "upgrade to Core/Pro",
            Capability::PerformanceDashboard | Capability::Reminders => "upgrade to Pro",
            Capability::AdditionalCompanions => "upgrade your plan",
        }
    }
}

/// Maximum number of companions the caller may author. `None` is unlimited.
pub fn companion_limit(entitlement: &dyn Entitlement) -> Option<usize> {
    if entitlement.has_plan(Tier::Pro) {
        None
    } else if entitlement.has_feature(FEATURE_3_COMPANION_LIMIT) {
        Some(DEFAULT_COMPANION_LIMIT)
    } else if entitlement.has_feature(FEATURE_10_COMPANION_LIMIT) {
        Some(CORE_COMPANION_LIMIT)
    } else {
        Some(DEFAULT_COMPANION_LIMIT)
    }
}

/// Explicit per-request identity and entitlements.
///
/// Every core operation takes one of these instead of reaching for an
/// ambient "current user".
pub struct RequestContext<'a> {
    user_id: Option<String>,
    entitlement: &'a dyn Entitlement,
}

impl<'a> RequestContext<'a> {
    /// Context for an authenticated user.
    pub fn new(user_id: impl Into<String>, entitlement: &'a dyn Entitlement) -> Self {
        Self {
            user_id: Some(user_id.into()),
            entitlement,
        }
    }

    /// Context without an identity.
    pub fn anonymous(entitlement: &'a dyn Entitlement) -> Self {
        Self {
            user_id: None,
            entitlement,
        }
    }

    /// The caller's user id, or [`Error::NotAuthenticated`].
    pub fn user_id(&self) -> Result<&str> {
        match self.user_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::NotAuthenticated),
        }
    }

    pub fn entitlement(&self) -> &dyn Entitlement {
        self.entitlement
    }

    /// Whether the caller holds `capability`.
    pub fn can(&self, capability: Capability) -> bool {
        capability.granted_by(self.entitlement)
    }

    /// Authenticate and check `capability`, returning the user id.
    pub fn require(&self, capability: Capability) -> Result<&str> {
        let user_id = self.user_id()?;
        if !self.can(capability) {
            tracing::debug!(user_id, ?capability, "capability denied");
            return Err(Error::AccessDenied { capability });
        }
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flags {
        pro: bool,
        ten: bool,
    }

    impl Entitlement for Flags {
        fn has_plan(&self, tier: Tier) -> bool {
            tier == Tier::Pro && self.pro
        }

        fn has_feature(&self, flag: &str) -> bool {
            flag == FEATURE_10_COMPANION_LIMIT && self.ten
        }
    }

    #[test]
    fn test_policy_table() {
        let free = PlanEntitlement::new(Tier::Free);
        let core = PlanEntitlement::new(Tier::Core);
        let pro = PlanEntitlement::new(Tier::Pro);

        assert!(!Capability::MonthlyReports.granted_by(&free));
        assert!(Capability::MonthlyReports.granted_by(&core));
        assert!(Capability::MonthlyReports.granted_by(&pro));

        assert!(!Capability::Reminders.granted_by(&core));
        assert!(Capability::Reminders.granted_by(&pro));
        assert!(!Capability::PerformanceDashboard.granted_by(&core));
    }

    #[test]
    fn test_feature_flag_alone_grants_history() {
        let flags = Flags {
            pro: false,
            ten: true,
        };
        assert!(Capability::ConversationHistory.granted_by(&flags));
        assert!(!Capability::Reminders.granted_by(&flags));
    }

    #[test]
    fn test_companion_limits() {
        assert_eq!(
            companion_limit(&PlanEntitlement::new(Tier::Free)),
            Some(DEFAULT_COMPANION_LIMIT)
        );
        assert_eq!(
            companion_limit(&PlanEntitlement::new(Tier::Core)),
            Some(CORE_COMPANION_LIMIT)
        );
        assert_eq!(companion_limit(&PlanEntitlement::new(Tier::Pro)), None);
        assert_eq!(
            companion_limit(&Flags {
                pro: false,
                ten: false
            }),
            Some(DEFAULT_COMPANION_LIMIT)
        );
    }

    #[test]
    fn test_request_context() {
        let free = PlanEntitlement::new(Tier::Free);

        let anon = RequestContext::anonymous(&free);
        assert!(matches!(anon.user_id(), Err(Error::NotAuthenticated)));
        assert!(matches!(
            anon.require(Capability::MonthlyReports),
            Err(Error::NotAuthenticated)
        ));

        let ctx = RequestContext::new("user_1", &free);
        assert_eq!(ctx.user_id().unwrap(), "user_1");
        assert!(matches!(
            ctx.require(Capability::MonthlyReports),
            Err(Error::AccessDenied {
                capability: Capability::MonthlyReports
            })
        ));
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("PRO".parse::<Tier>().unwrap(), Tier::Pro);
        assert!("gold".parse::<Tier>().is_err());
    }
}
