//! Entitlement and slot availability
//!
//! The provider abstracts purchase state so a real billing backend can be
//! swapped in later; the bundled fake keeps entitlements in local state
//! only. Slot math lives on `UserSettings`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;
use waypoint_domain::{Result, UserSettings};

use crate::tracker::ports::ApplicationRepository;

/// Interface for entitlement and subscription state
#[async_trait]
pub trait EntitlementProvider: Send + Sync {
    /// Watch the current settings value
    fn settings(&self) -> watch::Receiver<UserSettings>;

    /// Replace the settings value
    async fn update_settings(&self, settings: UserSettings) -> Result<()>;

    /// Activate the subscription entitlement
    async fn purchase_subscription(&self) -> Result<()>;

    /// Add one slot pack (+5 slots)
    async fn purchase_slot_pack(&self) -> Result<()>;

    /// Restore previously purchased entitlements
    async fn restore_purchases(&self) -> Result<()>;
}

/// In-memory provider standing in for a real billing integration
pub struct FakeEntitlementProvider {
    tx: watch::Sender<UserSettings>,
    rx: watch::Receiver<UserSettings>,
}

impl FakeEntitlementProvider {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(UserSettings::default());
        Self { tx, rx }
    }

    /// Current settings snapshot
    pub fn current(&self) -> UserSettings {
        self.rx.borrow().clone()
    }
}

impl Default for FakeEntitlementProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitlementProvider for FakeEntitlementProvider {
    fn settings(&self) -> watch::Receiver<UserSettings> {
        self.rx.clone()
    }

    async fn update_settings(&self, settings: UserSettings) -> Result<()> {
        self.tx.send_replace(settings);
        Ok(())
    }

    async fn purchase_subscription(&self) -> Result<()> {
        self.tx.send_modify(|settings| settings.subscription_active = true);
        info!("Subscription activated");
        Ok(())
    }

    async fn purchase_slot_pack(&self) -> Result<()> {
        self.tx.send_modify(|settings| settings.additional_slots_purchased += 1);
        info!("Slot pack purchased");
        Ok(())
    }

    async fn restore_purchases(&self) -> Result<()> {
        // Nothing to restore for local-only entitlements
        Ok(())
    }
}

/// Use case combining entitlement state with the live application count
pub struct EntitlementService {
    provider: Arc<dyn EntitlementProvider>,
    applications: Arc<dyn ApplicationRepository>,
}

impl EntitlementService {
    pub fn new(
        provider: Arc<dyn EntitlementProvider>,
        applications: Arc<dyn ApplicationRepository>,
    ) -> Self {
        Self { provider, applications }
    }

    pub fn settings(&self) -> watch::Receiver<UserSettings> {
        self.provider.settings()
    }

    /// Whether another active application fits within the slot limit
    pub async fn can_add_application(&self) -> Result<bool> {
        let active = self.applications.get_active_application_count().await?;
        Ok(self.provider.settings().borrow().can_add_application(active))
    }

    /// Remaining available slots, floored at zero
    pub async fn remaining_slots(&self) -> Result<u32> {
        let active = self.applications.get_active_application_count().await?;
        Ok(self.provider.settings().borrow().remaining_slots(active))
    }

    pub async fn purchase_subscription(&self) -> Result<()> {
        self.provider.purchase_subscription().await
    }

    pub async fn purchase_slot_pack(&self) -> Result<()> {
        self.provider.purchase_slot_pack().await
    }

    pub async fn restore_purchases(&self) -> Result<()> {
        self.provider.restore_purchases().await
    }
}
