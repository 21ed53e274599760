//! Narrow view over the `[libdefaults]` section of the library profile.
//!
//! The profile reader itself is external; this module only answers the
//! lookups the exchange needs, resolving a realm-scoped value before the
//! global one.

use crate::error::Result;
use std::collections::HashMap;

const CONF_YES: &[&str] = &["y", "yes", "true", "t", "1", "on"];
const CONF_NO: &[&str] = &["n", "no", "false", "nil", "0", "off"];

/// `[libdefaults]` values, global and per-realm.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    libdefaults: HashMap<String, String>,
    realms: HashMap<String, HashMap<String, String>>,
}

impl Profile {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn set(&mut self, option: &str, value: &str) {
        self.libdefaults
            .insert(option.to_string(), value.to_string());
    }

    pub fn set_for_realm(&mut self, realm: &str, option: &str, value: &str) {
        self.realms
            .entry(realm.to_string())
            .or_insert_with(HashMap::new)
            .insert(option.to_string(), value.to_string());
    }

    /// Lookup `option`, trying the realm-scoped group before the global
    /// `[libdefaults]` entries.
    pub fn get_string(&self, realm: &str, option: &str) -> Option<&str> {
        if let Some(group) = self.realms.get(realm) {
            if let Some(value) = group.get(option) {
                return Some(value);
            }
        }
        return self.libdefaults.get(option).map(|s| s.as_str());
    }

    pub fn get_boolean(&self, realm: &str, option: &str) -> Option<bool> {
        return self.get_string(realm, option).map(conf_boolean);
    }

    /// Lookup a time delta option. `Ok(None)` when the option is not set;
    /// a set but malformed value is an error.
    pub fn get_deltat(&self, realm: &str, option: &str) -> Result<Option<i32>> {
        match self.get_string(realm, option) {
            Some(value) => Ok(Some(parse_deltat(value)?)),
            None => Ok(None),
        }
    }
}

/// Parse a configuration boolean. Unrecognized values count as false.
pub fn conf_boolean(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    if CONF_YES.contains(&lower.as_str()) {
        return true;
    }
    if CONF_NO.contains(&lower.as_str()) {
        return false;
    }
    return false;
}

/// Parse a time delta string into seconds: bare seconds ("86400"),
/// unit-suffixed components ("1d2h30m45s") or clock notation ("10:00[:00]").
pub fn parse_deltat(value: &str) -> Result<i32> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<i32>() {
        return Ok(seconds);
    }

    if value.contains(':') {
        return parse_clock_deltat(value);
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if c.is_whitespace() && digits.is_empty() {
            continue;
        }
        let unit: i64 = match c.to_ascii_lowercase() {
            'd' => 24 * 60 * 60,
            'h' => 60 * 60,
            'm' => 60,
            's' => 1,
            _ => {
                return Err(format!("Invalid duration '{}'", value))?;
            }
        };
        let amount: i64 = digits
            .parse()
            .map_err(|_| format!("Invalid duration '{}'", value))?;
        digits.clear();
        total += amount * unit;
    }

    if !digits.is_empty() {
        // trailing number without a unit counts as seconds
        let amount: i64 = digits
            .parse()
            .map_err(|_| format!("Invalid duration '{}'", value))?;
        total += amount;
    }

    if total > i64::from(i32::max_value()) {
        return Ok(i32::max_value());
    }
    return Ok(total as i32);
}

fn parse_clock_deltat(value: &str) -> Result<i32> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return Err(format!("Invalid duration '{}'", value))?;
    }

    let mut total: i64 = 0;
    for (i, part) in parts.iter().enumerate() {
        let amount: i64 = part
            .trim()
            .parse()
            .map_err(|_| format!("Invalid duration '{}'", value))?;
        let unit = match parts.len() - i {
            3 => 60 * 60,
            2 => 60,
            _ => 1,
        };
        total += amount * unit;
    }

    if parts.len() == 2 {
        // h:m form
        total *= 60;
    }

    if total > i64::from(i32::max_value()) {
        return Ok(i32::max_value());
    }
    return Ok(total as i32);
}
