/// Settings panel state: linked devices and local preference toggles
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    /// "iOS", "Desktop", "Web"
    pub platform: String,
    pub last_active: String,
    pub is_current: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn current(&self) -> Option<&Device> {
        self.devices.iter().find(|d| d.is_current)
    }

    pub fn unverified(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| !d.verified)
    }

    /// Unlink another device. The device in use cannot remove itself.
    pub fn remove(&mut self, id: &str) -> Result<Device> {
        let pos = self
            .devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| ChatError::NotFound(format!("device {}", id)))?;
        if self.devices[pos].is_current {
            return Err(ChatError::InvalidInput(
                "cannot unlink the current device".to_string(),
            ));
        }
        let removed = self.devices.remove(pos);
        info!("Unlinked device {} ({})", removed.id, removed.name);
        Ok(removed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKey {
    Notifications,
    ReadReceipts,
    OnlineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub notifications: bool,
    pub read_receipts: bool,
    pub online_status: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            read_receipts: true,
            online_status: true,
        }
    }
}

impl Preferences {
    pub fn get(&self, key: PreferenceKey) -> bool {
        match key {
            PreferenceKey::Notifications => self.notifications,
            PreferenceKey::ReadReceipts => self.read_receipts,
            PreferenceKey::OnlineStatus => self.online_status,
        }
    }

    pub fn set(&mut self, key: PreferenceKey, value: bool) {
        let slot = match key {
            PreferenceKey::Notifications => &mut self.notifications,
            PreferenceKey::ReadReceipts => &mut self.read_receipts,
            PreferenceKey::OnlineStatus => &mut self.online_status,
        };
        *slot = value;
        info!("Preference {:?} = {}", key, value);
    }

    /// Flip a toggle and return the new value
    pub fn toggle(&mut self, key: PreferenceKey) -> bool {
        let value = !self.get(key);
        self.set(key, value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, current: bool, verified: bool) -> Device {
        Device {
            id: id.to_string(),
            name: format!("device-{}", id),
            platform: "Web".to_string(),
            last_active: "now".to_string(),
            is_current: current,
            verified,
        }
    }

    #[test]
    fn test_remove_device() {
        let mut reg = DeviceRegistry::new(vec![
            device("1", true, true),
            device("2", false, true),
            device("3", false, false),
        ]);
        assert_eq!(reg.unverified().count(), 1);

        assert!(matches!(reg.remove("1"), Err(ChatError::InvalidInput(_))));
        assert!(matches!(reg.remove("9"), Err(ChatError::NotFound(_))));
        assert_eq!(reg.remove("3").unwrap().id, "3");
        assert_eq!(reg.devices().len(), 2);
        assert_eq!(reg.current().unwrap().id, "1");
    }

    #[test]
    fn test_preferences_toggle() {
        let mut prefs = Preferences::default();
        assert!(prefs.get(PreferenceKey::ReadReceipts));
        assert!(!prefs.toggle(PreferenceKey::ReadReceipts));
        assert!(!prefs.read_receipts);
        prefs.set(PreferenceKey::Notifications, false);
        assert!(!prefs.notifications);
        assert!(prefs.online_status);
    }
}
