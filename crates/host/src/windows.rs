//! Window registry
//!
//! Host-owned record of the application windows, keyed by role. Opening a
//! role that is already open focuses it instead of creating a second one.

use parking_lot::RwLock;
use puppetry_common::{EntityKind, Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowRole {
    Main,
    Recorder,
}

impl fmt::Display for WindowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowRole::Main => write!(f, "main"),
            WindowRole::Recorder => write!(f, "recorder"),
        }
    }
}

/// Geometry and chrome of a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub frameless: bool,
    pub dev_tools: bool,
}

impl WindowSpec {
    pub fn for_role(role: WindowRole, dev_mode: bool) -> Self {
        match role {
            WindowRole::Main => Self {
                title: "Puppetry".to_string(),
                width: 1280,
                height: 800,
                min_width: 960,
                min_height: 540,
                frameless: false,
                dev_tools: dev_mode,
            },
            WindowRole::Recorder => Self {
                title: "Puppetry Recorder".to_string(),
                width: 1400,
                height: 820,
                min_width: 960,
                min_height: 540,
                frameless: true,
                dev_tools: dev_mode,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowState {
    pub role: WindowRole,
    pub spec: WindowSpec,
    pub focused: bool,
}

/// What [`WindowRegistry::open`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    Created,
    Focused,
}

pub struct WindowRegistry {
    dev_mode: bool,
    windows: RwLock<HashMap<WindowRole, WindowState>>,
}

impl WindowRegistry {
    pub fn new(dev_mode: bool) -> Self {
        Self {
            dev_mode,
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn open(&self, role: WindowRole) -> Opened {
        let mut windows = self.windows.write();
        let opened = if windows.contains_key(&role) {
            Opened::Focused
        } else {
            let spec = WindowSpec::for_role(role, self.dev_mode);
            info!("Opening {} window \"{}\" ({}x{})", role, spec.title, spec.width, spec.height);
            windows.insert(role, WindowState { role, spec, focused: false });
            Opened::Created
        };
        for (r, window) in windows.iter_mut() {
            window.focused = *r == role;
        }
        opened
    }

    pub fn focus(&self, role: WindowRole) -> Result<()> {
        let mut windows = self.windows.write();
        if !windows.contains_key(&role) {
            return Err(Error::not_found(EntityKind::Window, role.to_string()));
        }
        for (r, window) in windows.iter_mut() {
            window.focused = *r == role;
        }
        Ok(())
    }

    pub fn close(&self, role: WindowRole) -> Result<WindowState> {
        let closed = self
            .windows
            .write()
            .remove(&role)
            .ok_or_else(|| Error::not_found(EntityKind::Window, role.to_string()))?;
        info!("Closed {} window", role);
        Ok(closed)
    }

    pub fn set_title(&self, role: WindowRole, title: impl Into<String>) -> Result<()> {
        let mut windows = self.windows.write();
        let window = windows
            .get_mut(&role)
            .ok_or_else(|| Error::not_found(EntityKind::Window, role.to_string()))?;
        window.spec.title = title.into();
        debug!("{} window title: {}", role, window.spec.title);
        Ok(())
    }

    pub fn get(&self, role: WindowRole) -> Option<WindowState> {
        self.windows.read().get(&role).cloned()
    }

    pub fn is_open(&self, role: WindowRole) -> bool {
        self.windows.read().contains_key(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_twice_focuses() {
        let registry = WindowRegistry::new(false);
        assert_eq!(registry.open(WindowRole::Main), Opened::Created);
        assert_eq!(registry.open(WindowRole::Recorder), Opened::Created);
        assert!(!registry.get(WindowRole::Main).unwrap().focused);

        assert_eq!(registry.open(WindowRole::Main), Opened::Focused);
        assert!(registry.get(WindowRole::Main).unwrap().focused);
        assert!(!registry.get(WindowRole::Recorder).unwrap().focused);
    }

    #[test]
    fn test_recorder_spec() {
        let registry = WindowRegistry::new(true);
        registry.open(WindowRole::Recorder);
        let spec = registry.get(WindowRole::Recorder).unwrap().spec;
        assert_eq!(spec.title, "Puppetry Recorder");
        assert_eq!((spec.width, spec.height), (1400, 820));
        assert_eq!((spec.min_width, spec.min_height), (960, 540));
        assert!(spec.dev_tools);
        assert!(!WindowSpec::for_role(WindowRole::Recorder, false).dev_tools);
    }

    #[test]
    fn test_closed_window_is_gone() {
        let registry = WindowRegistry::new(false);
        registry.open(WindowRole::Recorder);
        registry.close(WindowRole::Recorder).unwrap();
        assert!(!registry.is_open(WindowRole::Recorder));
        assert!(registry.focus(WindowRole::Recorder).unwrap_err().is_not_found());
        assert!(registry.set_title(WindowRole::Recorder, "x").is_err());
    }
}
