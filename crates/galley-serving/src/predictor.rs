//! The demand predictor handle.
//!
//! A predictor is either freshly [`Trained`](DemandPredictor::Trained) in
//! this process or [`Loaded`](DemandPredictor::Loaded) from a saved bundle.
//! Both expose the same `predict` and `save`; neither can be mutated.

use crate::error::{ServingError, ServingResult};
use galley_checkpoint::ArtifactBundle;
use galley_data::{
    load, preprocess, CategoricalAttribute, CategoryEncoders, ConsumptionRecord,
};
use galley_training::{train_corpus, TrainConfig, TrainedModel, TrainingReport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Inputs for a single product prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub origin: String,
    pub flight_type: String,
    pub service_type: String,
    pub passenger_count: f64,
    pub product_name: String,
    pub unit_cost: f64,
    /// Whether crew reported an operational issue on the flight.
    #[serde(default)]
    pub has_issues: bool,
}

impl PredictionRequest {
    pub fn new(
        origin: impl Into<String>,
        flight_type: impl Into<String>,
        service_type: impl Into<String>,
        passenger_count: f64,
        product_name: impl Into<String>,
        unit_cost: f64,
    ) -> Self {
        Self {
            origin: origin.into(),
            flight_type: flight_type.into(),
            service_type: service_type.into(),
            passenger_count,
            product_name: product_name.into(),
            unit_cost,
            has_issues: false,
        }
    }

    pub fn with_issues(mut self, has_issues: bool) -> Self {
        self.has_issues = has_issues;
        self
    }
}

/// Rounds a raw forest output to a unit count: nearest integer with ties to
/// even, clamped at zero.
pub fn to_units(raw: f64) -> u64 {
    let rounded = raw.round_ties_even();
    if rounded > 0.0 {
        rounded as u64
    } else {
        0
    }
}

/// A model ready to predict.
#[derive(Debug, Clone)]
pub enum DemandPredictor {
    /// Fitted in this process.
    Trained {
        model: TrainedModel,
        report: TrainingReport,
    },
    /// Read from a bundle directory.
    Loaded { bundle: ArtifactBundle, source: PathBuf },
}

impl DemandPredictor {
    /// Loads the dataset at `path`, preprocesses it and trains a model.
    pub fn train(path: impl AsRef<Path>, config: &TrainConfig) -> ServingResult<Self> {
        let corpus = load(path)?;
        Self::train_on(&corpus, config)
    }

    /// Trains on an already loaded corpus.
    pub fn train_on(corpus: &[ConsumptionRecord], config: &TrainConfig) -> ServingResult<Self> {
        let prepared = preprocess(corpus);
        let outcome = train_corpus(&prepared, config)?;
        info!(
            rows = outcome.report.n_rows,
            test_r2 = outcome.report.test.r2,
            "Predictor trained"
        );
        Ok(Self::Trained {
            model: outcome.model,
            report: outcome.report,
        })
    }

    /// Loads a saved bundle from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> ServingResult<Self> {
        let dir = dir.as_ref();
        let bundle = ArtifactBundle::load(dir)?;
        Ok(Self::Loaded {
            bundle,
            source: dir.to_path_buf(),
        })
    }

    pub fn model(&self) -> &TrainedModel {
        match self {
            Self::Trained { model, .. } => model,
            Self::Loaded { bundle, .. } => &bundle.model,
        }
    }

    pub fn encoders(&self) -> &CategoryEncoders {
        &self.model().encoders
    }

    /// Feature columns in model input order.
    pub fn feature_names(&self) -> &[String] {
        &self.model().feature_names
    }

    /// Training report, if one is available. Bundles saved without a report
    /// have none.
    pub fn report(&self) -> Option<&TrainingReport> {
        match self {
            Self::Trained { report, .. } => Some(report),
            Self::Loaded { bundle, .. } => bundle.metadata.training.as_ref(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    /// Builds the feature row for `request` in the persisted feature order.
    pub fn encode(&self, request: &PredictionRequest) -> ServingResult<Vec<f64>> {
        for (name, value) in [
            ("passenger_count", request.passenger_count),
            ("unit_cost", request.unit_cost),
        ] {
            if !value.is_finite() {
                return Err(ServingError::invalid_request(format!(
                    "{name} must be a finite number, got {value}"
                )));
            }
        }

        let encoders = self.encoders();
        let code = |attribute: CategoricalAttribute, value: &str| -> ServingResult<f64> {
            Ok(f64::from(encoders.encode(attribute, value)?))
        };

        self.feature_names()
            .iter()
            .map(|name| match name.as_str() {
                "origin_code" => code(CategoricalAttribute::Origin, &request.origin),
                "flight_type_code" => code(CategoricalAttribute::FlightType, &request.flight_type),
                "service_type_code" => code(CategoricalAttribute::ServiceType, &request.service_type),
                "product_code" => code(CategoricalAttribute::ProductName, &request.product_name),
                "passenger_count" => Ok(request.passenger_count),
                "unit_cost" => Ok(request.unit_cost),
                "issue_flag" => Ok(if request.has_issues { 1.0 } else { 0.0 }),
                other => Err(ServingError::invalid_request(format!(
                    "model uses unsupported feature '{other}'"
                ))),
            })
            .collect()
    }

    /// Forest mean before rounding.
    pub fn predict_raw(&self, request: &PredictionRequest) -> ServingResult<f64> {
        let row = self.encode(request)?;
        Ok(self.model().predict_features(&row)?)
    }

    /// Predicted number of units consumed; never negative.
    pub fn predict(&self, request: &PredictionRequest) -> ServingResult<u64> {
        let raw = self.predict_raw(request)?;
        let units = to_units(raw);
        debug!(
            product = %request.product_name,
            raw,
            units,
            "Prediction"
        );
        Ok(units)
    }

    /// Writes the model as a bundle into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> ServingResult<()> {
        match self {
            Self::Trained { model, report } => {
                ArtifactBundle::new(model.clone(), Some(report)).save(dir)?
            }
            Self::Loaded { bundle, .. } => bundle.save(dir)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_predictor_is_send_sync() {
        assert_send_sync::<DemandPredictor>();
    }

    #[test]
    fn test_to_units_rounding() {
        assert_eq!(to_units(2.4), 2);
        assert_eq!(to_units(2.6), 3);
        assert_eq!(to_units(2.5), 2);
        assert_eq!(to_units(3.5), 4);
        assert_eq!(to_units(-0.7), 0);
        assert_eq!(to_units(0.4), 0);
    }

    #[test]
    fn test_request_json_defaults_issue_flag() {
        let req: PredictionRequest = serde_json::from_str(
            r#"{"origin":"DOH","flight_type":"long-haul","service_type":"Retail",
                "passenger_count":250,"product_name":"Water","unit_cost":0.5}"#,
        )
        .unwrap();
        assert!(!req.has_issues);
        assert_eq!(req, PredictionRequest::new("DOH", "long-haul", "Retail", 250.0, "Water", 0.5));
    }
}
