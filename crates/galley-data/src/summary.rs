//! Grouped consumption report over a corpus.
//!
//! Statistics are computed over records with positive consumption, the same
//! population the model is trained on before missing-value cleanup.

use crate::preprocess::derive_metrics;
use crate::record::{CategoricalAttribute, ConsumptionRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean of a value within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStat {
    pub group: String,
    pub mean: f64,
    pub count: usize,
}

/// Consumption statistics of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStat {
    pub product: String,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single observation.
    pub std: Option<f64>,
    pub count: usize,
}

/// Exploration report for a loaded corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub total_rows: usize,
    pub dropped_non_positive: usize,
    pub analysed_rows: usize,
    pub mean_consumed: Option<f64>,
    pub by_flight_type: Vec<GroupStat>,
    pub by_service_type: Vec<GroupStat>,
    pub by_origin: Vec<GroupStat>,
    /// Sorted by mean consumption, highest first.
    pub by_product: Vec<ProductStat>,
    /// Mean consumption with (`true`) and without (`false`) a crew issue.
    pub by_issue_flag: Vec<GroupStat>,
    pub per_passenger_by_flight_type: Vec<GroupStat>,
    /// Mean consumed / standard stocked ratio.
    pub mean_utilization: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    values: Vec<f64>,
}

impl Accumulator {
    fn push(&mut self, v: f64) {
        self.values.push(v);
    }

    fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
        }
    }

    fn sample_std(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let var = self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Some(var.sqrt())
    }
}

fn group_means(groups: BTreeMap<String, Accumulator>) -> Vec<GroupStat> {
    groups
        .into_iter()
        .filter_map(|(group, acc)| {
            acc.mean().map(|mean| GroupStat {
                group,
                mean,
                count: acc.values.len(),
            })
        })
        .collect()
}

fn group_by<F>(records: &[&ConsumptionRecord], key: F) -> Vec<GroupStat>
where
    F: Fn(&ConsumptionRecord) -> Option<(String, f64)>,
{
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();
    for record in records {
        if let Some((k, v)) = key(*record) {
            groups.entry(k).or_default().push(v);
        }
    }
    group_means(groups)
}

fn consumed_by(attribute: CategoricalAttribute) -> impl Fn(&ConsumptionRecord) -> Option<(String, f64)> {
    move |r: &ConsumptionRecord| Some((r.categorical(attribute)?.to_string(), r.quantity_consumed?))
}

/// Builds the exploration report for `corpus`.
pub fn summarize(corpus: &[ConsumptionRecord]) -> CorpusSummary {
    let analysed: Vec<&ConsumptionRecord> = corpus
        .iter()
        .filter(|r| r.has_positive_consumption())
        .collect();

    let mut consumed = Accumulator::default();
    let mut utilization = Accumulator::default();
    for record in &analysed {
        if let Some(q) = record.quantity_consumed {
            consumed.push(q);
        }
        if let Some(rate) = derive_metrics(record).consumption_rate {
            utilization.push(rate);
        }
    }

    let mut products: BTreeMap<String, Accumulator> = BTreeMap::new();
    for record in &analysed {
        if let (Some(p), Some(q)) = (record.product_name.as_ref(), record.quantity_consumed) {
            products.entry(p.clone()).or_default().push(q);
        }
    }
    let mut by_product: Vec<ProductStat> = products
        .into_iter()
        .filter_map(|(product, acc)| {
            Some(ProductStat {
                mean: acc.mean()?,
                std: acc.sample_std(),
                count: acc.values.len(),
                product,
            })
        })
        .collect();
    by_product.sort_by(|a, b| b.mean.total_cmp(&a.mean));

    CorpusSummary {
        total_rows: corpus.len(),
        dropped_non_positive: corpus.len() - analysed.len(),
        analysed_rows: analysed.len(),
        mean_consumed: consumed.mean(),
        by_flight_type: group_by(&analysed, consumed_by(CategoricalAttribute::FlightType)),
        by_service_type: group_by(&analysed, consumed_by(CategoricalAttribute::ServiceType)),
        by_origin: group_by(&analysed, consumed_by(CategoricalAttribute::Origin)),
        by_product,
        by_issue_flag: group_by(&analysed, |r| {
            Some((derive_metrics(r).has_issues.to_string(), r.quantity_consumed?))
        }),
        per_passenger_by_flight_type: group_by(&analysed, |r| {
            Some((
                r.flight_type.clone()?,
                derive_metrics(r).consumption_per_passenger?,
            ))
        }),
        mean_utilization: utilization.mean(),
    }
}
