// KQL query templates for decomposition and anomaly panels
//
// All five variants share one skeleton: resample the value column onto a
// uniform time grid, run the engine's series decomposition over it, expand
// back to one row per timestamp and join onto the base query so dimension
// columns survive. The ${...} tokens are Grafana template placeholders,
// resolved by Grafana at render time and never by this tool.
use crate::domain::panel::{PanelQuery, SkipReason};

/// Anomaly threshold placeholder, bound to the AnomalyThreshold textbox.
const THRESHOLD: &str = "todouble(\"${AnomalyThreshold}\")";

/// A query source followed by piped operators, rendered one per line.
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: String,
    stages: Vec<String>,
}

impl Pipeline {
    pub fn from(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            stages: Vec::new(),
        }
    }

    pub fn pipe(mut self, stage: impl Into<String>) -> Self {
        self.stages.push(stage.into());
        self
    }

    fn render(&self) -> String {
        let mut text = self.source.clone();
        for stage in &self.stages {
            text.push_str("\n| ");
            text.push_str(stage);
        }
        text
    }
}

/// Ordered `let` bindings followed by the expression the script evaluates to.
#[derive(Debug, Clone, Default)]
pub struct KqlScript {
    bindings: Vec<(String, String)>,
}

impl KqlScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, expr: impl Into<String>) -> Self {
        self.bindings.push((name.to_string(), expr.into()));
        self
    }

    pub fn bind_pipeline(self, name: &str, pipeline: Pipeline) -> Self {
        let rendered = pipeline.render();
        self.bind(name, rendered)
    }

    pub fn finish(self, tail: Pipeline) -> String {
        let mut text = String::new();
        for (name, expr) in &self.bindings {
            text.push_str("let ");
            text.push_str(name);
            text.push_str(" = ");
            text.push_str(expr);
            text.push_str(";\n");
        }
        text.push_str(&tail.render());
        text
    }
}

/// `dt`/`min_t`/`max_t` bindings common to every variant. `dt` is computed
/// once per base query and embedded verbatim.
fn preamble(base_query: &str, time_column: &str, dt: &str) -> KqlScript {
    KqlScript::new()
        .bind("dt", dt)
        .bind(
            "min_t",
            format!("toscalar({base_query} | summarize min({time_column}))"),
        )
        .bind(
            "max_t",
            format!("toscalar({base_query} | summarize max({time_column}))"),
        )
}

/// Uniform resampling of the value column, averaging duplicates per bucket.
fn resampled(base_query: &str, time_column: &str, value_column: &str) -> Pipeline {
    Pipeline::from(base_query).pipe(format!(
        "make-series num=avg(todouble({value_column})) on {time_column} from min_t to max_t step dt"
    ))
}

/// Per-bucket anomaly flags, shared by the three count variants.
fn anomaly_flags(base_query: &str, time_column: &str, value_column: &str) -> Pipeline {
    resampled(base_query, time_column, value_column)
        .pipe(format!(
            "extend Anomalies = series_decompose_anomalies(num, {THRESHOLD}, -1, 'linefit')"
        ))
        .pipe(format!(
            "mv-expand {time_column} to typeof(datetime), Anomalies to typeof(real)"
        ))
        .pipe(format!("project {time_column}, Anomalies"))
}

/// Filter restricting rows to the currently selected value of the
/// dimension's dashboard variable.
fn dimension_filter(dimension: &str) -> String {
    format!("where tostring({dimension}) == \"${{{dimension}}}\"")
}

/// Seasonal/trend decomposition of the value series. With a dimension the
/// query projects it and filters on its variable placeholder, so the panel
/// reacts to the dashboard selector.
pub fn decomposition_query(
    base_query: &str,
    time_column: &str,
    value_column: &str,
    dt: &str,
    dimension: Option<&str>,
) -> String {
    let decomposed = resampled(base_query, time_column, value_column)
        .pipe("extend (Baseline, Seasonal, Trend, Residual) = series_decompose(num, -1, 'linefit')")
        .pipe(format!(
            "mv-expand {time_column} to typeof(datetime), num to typeof(real), Seasonal to typeof(real), Trend to typeof(real)"
        ))
        .pipe(format!("project {time_column}, Trend, Seasonal"));

    let joined = Pipeline::from(base_query).pipe(format!(
        "join kind=leftouter decomposed_data on {time_column}"
    ));
    let joined = match dimension {
        Some(dim) => joined
            .pipe(format!(
                "project {time_column}, {value_column}, Seasonal, Trend, tostring({dim})"
            ))
            .pipe(dimension_filter(dim)),
        None => joined.pipe(format!(
            "project {time_column}, {value_column}, Seasonal, Trend"
        )),
    };

    preamble(base_query, time_column, dt)
        .bind_pipeline("decomposed_data", decomposed)
        .finish(joined)
}

/// Decomposition plus per-bucket anomaly flag and score channels.
pub fn anomalies_query(
    base_query: &str,
    time_column: &str,
    value_column: &str,
    dt: &str,
    dimension: Option<&str>,
) -> String {
    let anomalies = resampled(base_query, time_column, value_column)
        .pipe(format!(
            "extend (Anomalies, AnomalyScore) = series_decompose_anomalies(num, {THRESHOLD}, -1, 'linefit')"
        ))
        .pipe(format!(
            "mv-expand {time_column} to typeof(datetime), Anomalies to typeof(real), AnomalyScore to typeof(real)"
        ))
        .pipe(format!("project {time_column}, Anomalies, AnomalyScore"));

    let joined = Pipeline::from(base_query).pipe(format!(
        "join kind=leftouter anomalies_data on {time_column}"
    ));
    let joined = match dimension {
        Some(dim) => joined
            .pipe(format!(
                "project {time_column}, {value_column}, Anomalies, AnomalyScore, tostring({dim})"
            ))
            .pipe(dimension_filter(dim)),
        None => joined.pipe(format!(
            "project {time_column}, {value_column}, Anomalies, AnomalyScore"
        )),
    };

    preamble(base_query, time_column, dt)
        .bind_pipeline("anomalies_data", anomalies)
        .finish(joined)
}

/// Anomaly count per combination of dimension values, sorted descending.
/// Skipped when the base query exposes no dimensions to segment by.
pub fn segment_count_query(
    base_query: &str,
    time_column: &str,
    value_column: &str,
    dt: &str,
    dimensions: &[String],
) -> PanelQuery {
    if dimensions.is_empty() {
        return PanelQuery::Skipped(SkipReason::NoDimensions);
    }

    let by_clause = dimensions.join(", ");
    let tail = Pipeline::from(base_query)
        .pipe(format!(
            "join kind=leftouter anomaly_scores on {time_column}"
        ))
        .pipe("where Anomalies == 1")
        .pipe(format!(
            "summarize AnomalyCount = count() by Anomalies, {by_clause}"
        ))
        .pipe(format!("project AnomalyCount, {by_clause}"))
        .pipe("sort by AnomalyCount desc");

    PanelQuery::Emitted(
        preamble(base_query, time_column, dt)
            .bind_pipeline(
                "anomaly_scores",
                anomaly_flags(base_query, time_column, value_column),
            )
            .finish(tail),
    )
}

/// Anomaly count per distinct value of a single dimension, one row per
/// category.
pub fn dimension_bar_query(
    base_query: &str,
    time_column: &str,
    value_column: &str,
    dt: &str,
    dimension: &str,
) -> String {
    let tail = Pipeline::from(base_query)
        .pipe(format!(
            "join kind=leftouter anomalies_data on {time_column}"
        ))
        .pipe("where Anomalies == 1")
        .pipe(format!(
            "summarize AnomalyCount = count() by tostring({dimension})"
        ))
        .pipe(format!("extend Category = tostring({dimension})"));

    preamble(base_query, time_column, dt)
        .bind_pipeline(
            "anomalies_data",
            anomaly_flags(base_query, time_column, value_column),
        )
        .finish(tail)
}

/// Total anomaly count per dimension name, one union branch per dimension.
/// Skipped when no dimensions exist.
pub fn dimension_totals_query(
    base_query: &str,
    time_column: &str,
    value_column: &str,
    dt: &str,
    dimensions: &[String],
) -> PanelQuery {
    if dimensions.is_empty() {
        return PanelQuery::Skipped(SkipReason::NoDimensions);
    }

    let projection = dimensions.join(", ");
    let joined = Pipeline::from(base_query)
        .pipe(format!(
            "join kind=leftouter anomalies_data on {time_column}"
        ))
        .pipe("where Anomalies == 1")
        .pipe(format!("project {time_column}, Anomalies, {projection}"));

    let mut script = preamble(base_query, time_column, dt)
        .bind_pipeline(
            "anomalies_data",
            anomaly_flags(base_query, time_column, value_column),
        )
        .bind_pipeline("joined_data", joined);

    for dimension in dimensions {
        script = script.bind_pipeline(
            &format!("anomalies_by_{dimension}"),
            Pipeline::from("joined_data").pipe(format!(
                "summarize AnomalyCount = count() by Dimension = '{dimension}'"
            )),
        );
    }

    let mut tail = Pipeline::from(format!("anomalies_by_{}", dimensions[0]));
    for dimension in &dimensions[1..] {
        tail = tail.pipe(format!("union anomalies_by_{dimension}"));
    }

    PanelQuery::Emitted(script.finish(tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_decomposition_exact_rendering() {
        let query = decomposition_query("Orders", "Timestamp", "Latency", "5m", Some("Region"));
        let expected = "let dt = 5m;\n\
            let min_t = toscalar(Orders | summarize min(Timestamp));\n\
            let max_t = toscalar(Orders | summarize max(Timestamp));\n\
            let decomposed_data = Orders\n\
            | make-series num=avg(todouble(Latency)) on Timestamp from min_t to max_t step dt\n\
            | extend (Baseline, Seasonal, Trend, Residual) = series_decompose(num, -1, 'linefit')\n\
            | mv-expand Timestamp to typeof(datetime), num to typeof(real), Seasonal to typeof(real), Trend to typeof(real)\n\
            | project Timestamp, Trend, Seasonal;\n\
            Orders\n\
            | join kind=leftouter decomposed_data on Timestamp\n\
            | project Timestamp, Latency, Seasonal, Trend, tostring(Region)\n\
            | where tostring(Region) == \"${Region}\"";
        assert_eq!(query, expected);
    }

    #[test]
    fn test_decomposition_placeholder_only_with_dimension() {
        let filtered = decomposition_query("Orders", "ts", "value", "1h", Some("region"));
        assert_eq!(filtered.matches("${region}").count(), 1);
        assert!(filtered.contains("| where tostring(region) == \"${region}\""));

        let unfiltered = decomposition_query("Orders", "ts", "value", "1h", None);
        assert!(!unfiltered.contains("${"));
    }

    #[test]
    fn test_anomalies_query_embeds_threshold() {
        let query = anomalies_query("Orders", "ts", "value", "1h", None);
        assert_eq!(query.matches("${AnomalyThreshold}").count(), 1);
        assert!(query.contains(
            "series_decompose_anomalies(num, todouble(\"${AnomalyThreshold}\"), -1, 'linefit')"
        ));
        assert!(query.contains("| project ts, value, Anomalies, AnomalyScore"));
    }

    #[test]
    fn test_segment_count_skips_without_dimensions() {
        let result = segment_count_query("Orders", "ts", "value", "1h", &[]);
        assert_eq!(result, PanelQuery::Skipped(SkipReason::NoDimensions));
    }

    #[test]
    fn test_segment_count_groups_and_sorts() {
        let query = segment_count_query("Orders", "ts", "value", "1h", &dims(&["Region", "Host"]))
            .emitted()
            .unwrap();
        assert!(query.contains("| summarize AnomalyCount = count() by Anomalies, Region, Host"));
        assert!(query.contains("| project AnomalyCount, Region, Host"));
        assert!(query.ends_with("| sort by AnomalyCount desc"));
        assert!(!query.contains("${Region}"));
    }

    #[test]
    fn test_dimension_bar_categories() {
        let query = dimension_bar_query("Orders", "ts", "value", "1h", "Region");
        assert!(query.contains("| summarize AnomalyCount = count() by tostring(Region)"));
        assert!(query.ends_with("| extend Category = tostring(Region)"));
        assert!(!query.contains("${Region}"));
    }

    #[test]
    fn test_dimension_totals_skips_without_dimensions() {
        let result = dimension_totals_query("Orders", "ts", "value", "1h", &[]);
        assert_eq!(result, PanelQuery::Skipped(SkipReason::NoDimensions));
    }

    #[test]
    fn test_dimension_totals_unions_per_dimension() {
        let query = dimension_totals_query("Orders", "ts", "value", "1h", &dims(&["Region", "Host"]))
            .emitted()
            .unwrap();
        assert!(query.contains("summarize AnomalyCount = count() by Dimension = 'Region'"));
        assert!(query.contains("summarize AnomalyCount = count() by Dimension = 'Host'"));
        assert!(query.ends_with("anomalies_by_Region\n| union anomalies_by_Host"));
    }
}
