// Panel domain models

/// Visualization used for a chart panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viz {
    Timeseries,
    BarChart,
    Table,
}

impl Viz {
    /// Grafana panel type string.
    pub fn panel_type(self) -> &'static str {
        match self {
            Viz::Timeseries => "timeseries",
            Viz::BarChart => "barchart",
            Viz::Table => "table",
        }
    }

    /// Result format the datasource target asks for.
    pub fn result_format(self) -> &'static str {
        match self {
            Viz::Timeseries => "time_series",
            Viz::BarChart | Viz::Table => "table",
        }
    }
}

/// One entry of the ordered panel list.
///
/// Row separators carry no query; chart panels may be repeat-bound to a
/// dimension variable so Grafana clones them per selected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    Row {
        title: String,
        collapsed: bool,
    },
    Chart {
        title: String,
        viz: Viz,
        query: String,
        repeat: Option<String>,
    },
}

impl Panel {
    pub fn row(title: &str) -> Self {
        Panel::Row {
            title: title.to_string(),
            collapsed: false,
        }
    }

    pub fn chart(title: String, viz: Viz, query: String) -> Self {
        Panel::Chart {
            title,
            viz,
            query,
            repeat: None,
        }
    }

    pub fn repeated(title: String, viz: Viz, query: String, repeat: String) -> Self {
        Panel::Chart {
            title,
            viz,
            query,
            repeat: Some(repeat),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Panel::Row { title, .. } | Panel::Chart { title, .. } => title,
        }
    }
}

/// Outcome of a query generator that may decline to produce a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelQuery {
    Emitted(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The variant groups by dimensions and none were supplied
    NoDimensions,
}

impl PanelQuery {
    pub fn emitted(self) -> Option<String> {
        match self {
            PanelQuery::Emitted(query) => Some(query),
            PanelQuery::Skipped(_) => None,
        }
    }
}
