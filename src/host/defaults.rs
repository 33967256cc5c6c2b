//! Default values for every settings-store key.

use crate::storage::settings_store::keys;

/// Key/default pairs, in the order they are documented.
pub const DEFAULTS: &[(&str, &str)] = &[
    (keys::CLIENT_ID, ""),
    (keys::CLIENT_SECRET, ""),
    (keys::REDIRECT_URI, ""),
    (keys::ACCESS_TOKEN, ""),
    (keys::ACCOUNT_EMAIL, ""),
    (keys::BACKUP_DIRS, "[]"),
    (keys::BACKUP_FREQ, "daily"),
    (keys::RETENTION_COUNT, "5"),
    (keys::BACKUP_LOGS, "[]"),
];

/// Default for `key`; unknown keys default to the empty string.
#[must_use]
pub fn default_value(key: &str) -> &'static str {
    DEFAULTS
        .iter()
        .find(|(k, _)| *k == key)
        .map_or("", |(_, v)| v)
}
