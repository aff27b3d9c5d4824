use std::collections::BTreeMap;

/// Named scalar diagnostics.
///
/// The key prefix tells how values from different sources are merged: `mean||`,
/// `sample||`, `min||` or `max||`. Keys without a prefix are averaged.
pub type Metrics = BTreeMap<String, f32>;

const SEPARATOR: &str = "||";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Mean,
    /// Keeps the value of the first source reporting the metric.
    Sample,
    Min,
    Max,
}

impl Reduction {
    /// Reads the reduction of a metric out of its key.
    pub fn of(key: &str) -> Self {
        match key.split_once(SEPARATOR).map(|(prefix, _)| prefix) {
            Some("sample") => Reduction::Sample,
            Some("min") => Reduction::Min,
            Some("max") => Reduction::Max,
            _ => Reduction::Mean,
        }
    }
}

/// Merges the metrics of several sources, a key missing from some of them is
/// reduced over the sources that have it.
///
/// # Arguments
/// * `sources` - The metrics to merge.
///
/// # Returns
/// The merged metrics.
pub fn merge<'a, I>(sources: I) -> Metrics
where
    I: IntoIterator<Item = &'a Metrics>,
{
    let mut grouped: BTreeMap<&str, Vec<f32>> = BTreeMap::new();

    for metrics in sources {
        for (key, &value) in metrics {
            grouped.entry(key.as_str()).or_default().push(value);
        }
    }

    grouped
        .into_iter()
        .map(|(key, values)| {
            let value = match Reduction::of(key) {
                Reduction::Mean => values.iter().sum::<f32>() / values.len() as f32,
                Reduction::Sample => values[0],
                Reduction::Min => values.iter().copied().fold(f32::INFINITY, f32::min),
                Reduction::Max => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            };

            (key.to_string(), value)
        })
        .collect()
}
