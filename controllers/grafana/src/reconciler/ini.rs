//! grafana.ini rendering.
//!
//! An optional base template (read once at startup) is parsed into ordered sections,
//! then the values derived from the Grafana spec are layered on top.

use crds::Grafana;

use super::model::normalize_log_level;
use crate::constants::{
    DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USER, GRAFANA_DATA_PATH, GRAFANA_LOGS_PATH,
    GRAFANA_PLUGINS_PATH, GRAFANA_PROVISIONING_PATH,
};
use crate::error::ControllerError;
use crate::hash::content_hash;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

/// Ordered ini document. Keys without a section live in the unnamed leading section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, ControllerError> {
        let mut document = IniDocument::default();
        let mut current = String::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_string();
                document.section_mut(&current);
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ControllerError::Build {
                    resource: "grafana.ini",
                    reason: format!("line {}: expected 'key = value', found '{}'", number + 1, line),
                });
            };
            document.set(&current, key.trim(), value.trim())?;
        }
        Ok(document)
    }

    fn section_mut(&mut self, name: &str) -> &mut IniSection {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(IniSection {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    /// Sets `key` in `section`, replacing an existing value in place
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> Result<(), ControllerError> {
        let value = value.into();
        if key.is_empty() || value.contains(['\n', '\r']) || key.contains(['\n', '\r', '=']) {
            return Err(ControllerError::Build {
                resource: "grafana.ini",
                reason: format!("invalid entry '{}' in section [{}]", key, section),
            });
        }
        let section = self.section_mut(section);
        match section.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => section.entries.push((key.to_string(), value)),
        }
        Ok(())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            if section.entries.is_empty() && section.name.is_empty() {
                continue;
            }
            if !section.name.is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&format!("[{}]\n", section.name));
            }
            for (key, value) in &section.entries {
                out.push_str(&format!("{} = {}\n", key, value));
            }
        }
        out
    }
}

/// Rendered grafana.ini and its hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub contents: String,
    pub hash: String,
}

/// Renders grafana.ini for `grafana` on top of `template`
pub fn render_grafana_ini(grafana: &Grafana, template: Option<&str>) -> Result<RenderedConfig, ControllerError> {
    let spec = &grafana.spec;
    let mut ini = match template {
        Some(text) => IniDocument::parse(text)?,
        None => IniDocument::default(),
    };

    ini.set("paths", "data", GRAFANA_DATA_PATH)?;
    ini.set("paths", "logs", GRAFANA_LOGS_PATH)?;
    ini.set("paths", "plugins", GRAFANA_PLUGINS_PATH)?;
    ini.set("paths", "provisioning", GRAFANA_PROVISIONING_PATH)?;

    ini.set("log", "mode", "console")?;
    ini.set("log", "level", normalize_log_level(spec.log_level.as_deref()))?;

    ini.set(
        "security",
        "admin_user",
        non_empty(spec.admin_user.as_deref()).unwrap_or(DEFAULT_ADMIN_USER),
    )?;
    ini.set(
        "security",
        "admin_password",
        non_empty(spec.admin_password.as_deref()).unwrap_or(DEFAULT_ADMIN_PASSWORD),
    )?;

    ini.set("auth", "disable_login_form", spec.disable_login_form.to_string())?;
    ini.set("auth", "disable_signout_menu", spec.disable_signout_menu.to_string())?;
    ini.set("auth.basic", "enabled", spec.basic_auth.to_string())?;
    ini.set("auth.anonymous", "enabled", spec.anonymous.to_string())?;

    let contents = ini.render();
    let hash = content_hash(&[contents.as_str()]);
    Ok(RenderedConfig { contents, hash })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
