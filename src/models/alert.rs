use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub icon: String,
}

impl Alert {
    pub fn new(id: &str, severity: Severity, message: impl Into<String>, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            severity,
            message: message.into(),
            icon: icon.to_string(),
        }
    }
}

/// Alerts keyed by id. Inserting an id that already exists replaces it in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AlertSet {
    alerts: Vec<Alert>,
}

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alert: Alert) {
        match self.alerts.iter_mut().find(|existing| existing.id == alert.id) {
            Some(existing) => *existing = alert,
            None => self.alerts.push(alert),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|alert| alert.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: &str) -> Option<Alert> {
        let index = self.alerts.iter().position(|alert| alert.id == id)?;
        Some(self.alerts.remove(index))
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }
}

impl FromIterator<Alert> for AlertSet {
    fn from_iter<I: IntoIterator<Item = Alert>>(iter: I) -> Self {
        let mut set = AlertSet::new();
        for alert in iter {
            set.insert(alert);
        }
        set
    }
}
