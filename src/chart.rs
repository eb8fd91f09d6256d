//! Aggregation of a filtered subset into grouped bar charts.
//!
//! [`build_chart`] never fails: anything that leaves nothing to draw (an empty
//! subset, a value column with no samples, no row carrying the category
//! value) comes back as [`Chart::NoData`].

use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

use crate::color::ColorMap;
use crate::data::model::{DimValue, Dimension, Metric, Observation, GROUP_LABEL};

/// Text of the placeholder chart.
pub const NO_DATA_TEXT: &str = "No Data to Display";

pub const CHART_WIDTH: f32 = 1850.0;
pub const CHART_HEIGHT: f32 = 500.0;
pub const LEGEND_FONT_SIZE: f32 = 14.0;
pub const AXIS_TITLE_FONT_SIZE: f32 = 16.0;
pub const NO_DATA_FONT_SIZE: f32 = 25.0;

/// Which network measurement the network chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkView {
    Received,
    Sent,
    Total,
}

impl NetworkView {
    pub const ALL: [NetworkView; 3] = [NetworkView::Received, NetworkView::Sent, NetworkView::Total];

    pub fn metric(self) -> Metric {
        match self {
            NetworkView::Received => Metric::NetworkReceived,
            NetworkView::Sent => Metric::NetworkSent,
            NetworkView::Total => Metric::NetworkTotal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NetworkView::Received => "Network - Received",
            NetworkView::Sent => "Network - Sent",
            NetworkView::Total => "Network - Total",
        }
    }
}

/// One bar: the mean of the value metric for a (category value, group) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedBar {
    pub category: DimValue,
    pub group: String,
    pub mean: f64,
}

/// All bars sharing one category value, drawn in one colour.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub category: DimValue,
    pub color: Color32,
    /// `(index into BarChartSpec::groups, mean)` pairs.
    pub points: Vec<(usize, f64)>,
}

/// A renderable grouped bar chart.
#[derive(Debug, Clone, PartialEq)]
pub struct BarChartSpec {
    pub category: Dimension,
    pub value: Metric,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub legend_title: &'static str,
    /// X-axis categories, ascending.
    pub groups: Vec<String>,
    /// Bars sorted ascending by (category value, group).
    pub bars: Vec<GroupedBar>,
    /// One series per category value, ascending.
    pub series: Vec<BarSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Bars(BarChartSpec),
    NoData,
}

impl Chart {
    pub fn is_no_data(&self) -> bool {
        matches!(self, Chart::NoData)
    }

    pub fn bars(&self) -> &[GroupedBar] {
        match self {
            Chart::Bars(spec) => &spec.bars,
            Chart::NoData => &[],
        }
    }
}

/// Mean of `value` per (group, `category` value), as a grouped bar chart.
pub fn build_chart(rows: &[&Observation], category: Dimension, value: Metric) -> Chart {
    // Keyed by (category, group) so iteration order is the display order.
    let mut sums: BTreeMap<(DimValue, &str), (f64, usize)> = BTreeMap::new();
    for row in rows {
        let cat = row.dim(category);
        if cat.is_null() {
            continue;
        }
        let entry = sums.entry((cat.clone(), row.group.as_str())).or_insert((0.0, 0));
        if let Some(v) = row.metric(value).filter(|v| v.is_finite()) {
            entry.0 += v;
            entry.1 += 1;
        }
    }

    let bars: Vec<GroupedBar> = sums
        .into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|((category, group), (sum, n))| GroupedBar {
            category,
            group: group.to_string(),
            mean: sum / n as f64,
        })
        .collect();

    if bars.is_empty() {
        log::debug!(
            "No bars for {} by {}; showing placeholder",
            value.column(),
            category.column()
        );
        return Chart::NoData;
    }

    let groups: Vec<String> = bars
        .iter()
        .map(|b| b.group.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect();
    let categories: BTreeSet<DimValue> = bars.iter().map(|b| b.category.clone()).collect();
    let colors = ColorMap::new(&categories);

    let series = categories
        .into_iter()
        .map(|cat| {
            let points = bars
                .iter()
                .filter(|b| b.category == cat)
                .filter_map(|b| {
                    let idx = groups.binary_search(&b.group).ok()?;
                    Some((idx, b.mean))
                })
                .collect();
            BarSeries {
                color: colors.color_for(&cat),
                category: cat,
                points,
            }
        })
        .collect();

    Chart::Bars(BarChartSpec {
        category,
        value,
        x_label: GROUP_LABEL,
        y_label: value.label(),
        legend_title: category.label(),
        groups,
        bars,
        series,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::G10;

    fn obs(group: &str, ingester: i64, cpu: Option<f64>) -> Observation {
        Observation::new(group)
            .with_dim(Dimension::Ingester, ingester)
            .with_metric(Metric::Cpu, cpu)
    }

    #[test]
    fn empty_subset_is_no_data() {
        assert_eq!(build_chart(&[], Dimension::Ingester, Metric::Cpu), Chart::NoData);
    }

    #[test]
    fn missing_value_column_is_no_data() {
        let rows = [obs("minio", 1, None), obs("minio", 2, None)];
        let refs: Vec<&Observation> = rows.iter().collect();
        let chart = build_chart(&refs, Dimension::Ingester, Metric::Cpu);
        assert!(chart.is_no_data());
        assert!(chart.bars().is_empty());
    }

    #[test]
    fn null_category_rows_are_dropped() {
        let rows = [Observation::new("minio").with_metric(Metric::Cpu, Some(3.0))];
        let refs: Vec<&Observation> = rows.iter().collect();
        assert!(build_chart(&refs, Dimension::Nginx, Metric::Cpu).is_no_data());
    }

    #[test]
    fn groups_average_and_sort_by_category_then_group() {
        let rows = [
            obs("cortex ingester", 2, Some(40.0)),
            obs("cortex ingester", 1, Some(10.0)),
            obs("cortex distributor", 2, Some(8.0)),
            obs("cortex ingester", 1, Some(20.0)),
            obs("cortex distributor", 1, Some(4.0)),
            obs("cortex distributor", 1, None),
            obs("cortex ingester", 2, Some(60.0)),
        ];
        let refs: Vec<&Observation> = rows.iter().collect();

        let Chart::Bars(spec) = build_chart(&refs, Dimension::Ingester, Metric::Cpu) else {
            panic!("expected bars");
        };

        let order: Vec<(DimValue, &str, f64)> = spec
            .bars
            .iter()
            .map(|b| (b.category.clone(), b.group.as_str(), b.mean))
            .collect();
        assert_eq!(
            order,
            vec![
                (DimValue::Integer(1), "cortex distributor", 4.0),
                (DimValue::Integer(1), "cortex ingester", 15.0),
                (DimValue::Integer(2), "cortex distributor", 8.0),
                (DimValue::Integer(2), "cortex ingester", 50.0),
            ]
        );
        assert_eq!(spec.groups, vec!["cortex distributor", "cortex ingester"]);
        assert_eq!(spec.x_label, "Application's group");
        assert_eq!(spec.y_label, "CPU (%)");
        assert_eq!(spec.legend_title, "Number of Ingesters");

        assert_eq!(spec.series.len(), 2);
        assert_eq!(spec.series[0].color, G10[0]);
        assert_eq!(spec.series[1].points, vec![(0, 8.0), (1, 50.0)]);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let rows = [obs("minio", 1, Some(f64::NAN)), obs("minio", 1, Some(6.0))];
        let refs: Vec<&Observation> = rows.iter().collect();
        let chart = build_chart(&refs, Dimension::Ingester, Metric::Cpu);
        assert_eq!(chart.bars()[0].mean, 6.0);
    }

    #[test]
    fn mixed_integer_and_fractional_axis_sorts_numerically() {
        use crate::data::model::MetricsDataset;

        let ds = MetricsDataset::prepare(
            [21600.0, 3600.0, 5400.5]
                .into_iter()
                .map(|p| {
                    Observation::new("cortex ingester")
                        .with_dim(Dimension::RetentionPeriod, DimValue::Float(p))
                        .with_metric(Metric::Cpu, Some(p / 100.0))
                })
                .collect(),
        )
        .unwrap();
        let refs: Vec<&Observation> = ds.rows().iter().collect();

        let Chart::Bars(spec) = build_chart(&refs, Dimension::RetentionPeriod, Metric::Cpu) else {
            panic!("expected bars");
        };
        let order: Vec<String> = spec.bars.iter().map(|b| b.category.to_string()).collect();
        assert_eq!(order, vec!["3600", "5400.5", "21600"]);
        assert!(spec.series.iter().all(|s| s.points.len() == 1));
    }
}
