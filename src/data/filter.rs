use std::collections::{BTreeMap, BTreeSet};

use super::model::{DimValue, Dimension, MetricsDataset, Observation};

// ---------------------------------------------------------------------------
// Filter predicate: which values are accepted per dimension
// ---------------------------------------------------------------------------

/// Per-dimension selection state: maps dimension → set of accepted values.
/// If a dimension is absent or its set is empty, it means "no filter" (show all).
pub type Constraints = BTreeMap<Dimension, BTreeSet<DimValue>>;

/// One filter request: the constraints plus the dimension drawn on the
/// chart's category axis. The active dimension is never filtered so the
/// chart always shows all of its observed values.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub active: Dimension,
    pub constraints: Constraints,
}

impl FilterSpec {
    pub fn new(active: Dimension) -> Self {
        FilterSpec {
            active,
            constraints: Constraints::new(),
        }
    }

    pub fn with(mut self, dim: Dimension, values: impl IntoIterator<Item = DimValue>) -> Self {
        self.constraints.insert(dim, values.into_iter().collect());
        self
    }

    /// The constraints that actually restrict rows.
    fn effective(&self) -> impl Iterator<Item = (Dimension, &BTreeSet<DimValue>)> {
        self.constraints.iter().filter_map(move |(dim, accepted)| {
            let applies = *dim != self.active && dim.is_filterable() && !accepted.is_empty();
            applies.then_some((*dim, accepted))
        })
    }

    /// Whether a single row passes every effective constraint.
    pub fn accepts(&self, row: &Observation) -> bool {
        self.effective()
            .all(|(dim, accepted)| accepted.contains(row.dim(dim)))
    }
}

/// Return the rows of the dataset that pass all effective constraints, in
/// dataset order.
pub fn filter<'a>(dataset: &'a MetricsDataset, spec: &FilterSpec) -> Vec<&'a Observation> {
    filter_rows(dataset.rows(), spec)
}

/// Same as [`filter`] over any row sequence, so an already-filtered subset can
/// be narrowed again.
pub fn filter_rows<'a, I>(rows: I, spec: &FilterSpec) -> Vec<&'a Observation>
where
    I: IntoIterator<Item = &'a Observation>,
{
    rows.into_iter().filter(|row| spec.accepts(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Metric;

    fn dataset() -> MetricsDataset {
        let mut rows = Vec::new();
        for (group, ingester, labels, cpu) in [
            ("cortex ingester", 1, 20, 10.0),
            ("cortex ingester", 2, 20, 14.0),
            ("cortex ingester", 2, 5, 9.0),
            ("cortex distributor", 1, 20, 4.0),
            ("cortex distributor", 2, 5, 6.0),
            ("minio", 1, 5, 2.0),
        ] {
            rows.push(
                Observation::new(group)
                    .with_dim(Dimension::Ingester, ingester as i64)
                    .with_dim(Dimension::Labels, labels as i64)
                    .with_dim(Dimension::Case, "quasi_real")
                    .with_metric(Metric::Cpu, Some(cpu)),
            );
        }
        MetricsDataset::prepare(rows).unwrap()
    }

    fn ints(values: &[i64]) -> Vec<DimValue> {
        values.iter().map(|v| DimValue::Integer(*v)).collect()
    }

    #[test]
    fn empty_constraints_pass_everything() {
        let ds = dataset();
        let spec = FilterSpec::new(Dimension::Case)
            .with(Dimension::Labels, Vec::new())
            .with(Dimension::Ingester, Vec::new());
        assert_eq!(filter(&ds, &spec).len(), ds.len());
    }

    #[test]
    fn constraints_combine_with_and() {
        let ds = dataset();
        let spec = FilterSpec::new(Dimension::Case)
            .with(Dimension::Labels, ints(&[20]))
            .with(Dimension::Ingester, ints(&[2]));
        let rows = filter(&ds, &spec);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group, "cortex ingester");
        assert_eq!(rows[0].metric(Metric::Cpu), Some(14.0));
    }

    #[test]
    fn active_dimension_constraint_is_ignored() {
        let ds = dataset();
        let spec = FilterSpec::new(Dimension::Ingester)
            .with(Dimension::Ingester, ints(&[1]))
            .with(Dimension::Labels, ints(&[5]));
        let rows = filter(&ds, &spec);
        // Only the label constraint applies: ingester 2 rows survive.
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().any(|r| r.dim(Dimension::Ingester) == &DimValue::Integer(2)));
    }

    #[test]
    fn filtering_is_idempotent_and_order_preserving() {
        let ds = dataset();
        let spec = FilterSpec::new(Dimension::Case).with(Dimension::Labels, ints(&[5]));
        let once = filter(&ds, &spec);
        let twice = filter_rows(once.iter().copied(), &spec);
        assert_eq!(once, twice);

        let positions: Vec<usize> = once
            .iter()
            .map(|r| ds.rows().iter().position(|x| std::ptr::eq(x, *r)).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn unmatched_constraint_yields_empty_subset() {
        let ds = dataset();
        let spec = FilterSpec::new(Dimension::Case).with(Dimension::Labels, ints(&[99]));
        assert!(filter(&ds, &spec).is_empty());
    }

    #[test]
    fn source_dataset_is_untouched() {
        let ds = dataset();
        let before = ds.rows().to_vec();
        let spec = FilterSpec::new(Dimension::Labels).with(Dimension::Ingester, ints(&[1]));
        let _ = filter(&ds, &spec);
        assert_eq!(ds.rows(), before.as_slice());
    }
}
