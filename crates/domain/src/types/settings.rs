//! User settings and entitlement state
//!
//! Process-wide single instance, never stored in the encrypted database.
//! Privacy-first defaults: analytics require explicit opt-in.

use serde::{Deserialize, Serialize};

use crate::constants::{BASE_ACTIVE_SLOTS, SLOTS_PER_PACK, SUBSCRIPTION_BONUS_SLOTS};

/// User settings and preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub research_assistance_enabled: bool,
    pub notifications_enabled: bool,
    /// None = follow the system theme
    pub dark_mode_enabled: Option<bool>,
    pub has_seen_onboarding: bool,
    pub has_opted_into_analytics: bool,
    // Entitlement state
    pub subscription_active: bool,
    pub additional_slots_purchased: u32,
    // Bring-your-own sync backend (stub, never enabled by the core)
    pub sync_url: Option<String>,
    pub sync_key: Option<String>,
    pub sync_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            research_assistance_enabled: true,
            notifications_enabled: true,
            dark_mode_enabled: None,
            has_seen_onboarding: false,
            has_opted_into_analytics: false,
            subscription_active: false,
            additional_slots_purchased: 0,
            sync_url: None,
            sync_key: None,
            sync_enabled: false,
        }
    }
}

impl UserSettings {
    /// Total allowed active application slots.
    ///
    /// Free: 3, subscription: 18 (3+15), each one-time pack: +5.
    pub fn max_active_slots(&self) -> u32 {
        let subscription_bonus = if self.subscription_active { SUBSCRIPTION_BONUS_SLOTS } else { 0 };
        BASE_ACTIVE_SLOTS + subscription_bonus + self.additional_slots_purchased * SLOTS_PER_PACK
    }

    /// Whether another active application fits within the slot limit
    pub fn can_add_application(&self, current_active_count: u32) -> bool {
        current_active_count < self.max_active_slots()
    }

    /// Remaining available slots, floored at zero
    pub fn remaining_slots(&self, current_active_count: u32) -> u32 {
        self.max_active_slots().saturating_sub(current_active_count)
    }
}
