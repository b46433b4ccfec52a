// Dashboard domain model
use super::panel::Panel;
use super::variable::TemplateVariable;

/// Ordered output of the panel planner, consumed once by the assembler.
#[derive(Debug, Clone)]
pub struct DashboardPlan {
    pub title: String,
    pub panels: Vec<Panel>,
    pub variables: Vec<TemplateVariable>,
}

impl DashboardPlan {
    pub fn new(title: String, panels: Vec<Panel>, variables: Vec<TemplateVariable>) -> Self {
        Self {
            title,
            panels,
            variables,
        }
    }

    /// Stable identifier Grafana overwrites by: the title lower-cased with
    /// runs of non-word characters collapsed to single dashes.
    pub fn uid(&self) -> String {
        dashboard_uid(&self.title)
    }
}

pub fn dashboard_uid(title: &str) -> String {
    let mut uid = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_sep && !uid.is_empty() {
                uid.push('-');
            }
            pending_sep = false;
            uid.push(c);
        } else {
            pending_sep = true;
        }
    }
    uid
}
