//! Raw consumption records as read from the catering export.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names the loader requires, in export order.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Origin",
    "Flight_Type",
    "Service_Type",
    "Product_Name",
    "Passenger_Count",
    "Unit_Cost",
    "Standard_Specification_Qty",
    "Quantity_Consumed",
    "Quantity_Returned",
    "Crew_Feedback",
];

/// The four categorical attributes that get an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalAttribute {
    /// Origin airport code.
    Origin,
    /// Flight length class (short-haul, long-haul, ...).
    FlightType,
    /// Service type class (Retail, Pick & Pack, ...).
    ServiceType,
    /// Catering product name.
    ProductName,
}

impl CategoricalAttribute {
    /// All attributes in feature-table order.
    pub const ALL: [CategoricalAttribute; 4] = [
        CategoricalAttribute::Origin,
        CategoricalAttribute::FlightType,
        CategoricalAttribute::ServiceType,
        CategoricalAttribute::ProductName,
    ];

    /// Stable lowercase name used in errors and artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::FlightType => "flight_type",
            Self::ServiceType => "service_type",
            Self::ProductName => "product_name",
        }
    }

    /// Column header in the source export.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Origin => "Origin",
            Self::FlightType => "Flight_Type",
            Self::ServiceType => "Service_Type",
            Self::ProductName => "Product_Name",
        }
    }

    /// Name of the encoded column in the feature table.
    pub fn code_feature(&self) -> &'static str {
        match self {
            Self::Origin => "origin_code",
            Self::FlightType => "flight_type_code",
            Self::ServiceType => "service_type_code",
            Self::ProductName => "product_code",
        }
    }
}

impl fmt::Display for CategoricalAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One historical observation of a product on a flight.
///
/// Empty cells in the export are kept as `None`; they are dropped later by
/// [`preprocess`](crate::preprocess) if they reach the feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Departure station code, e.g. `DOH`.
    pub origin: Option<String>,
    /// Flight-length class (`short-haul`, `medium-haul`, `long-haul`).
    pub flight_type: Option<String>,
    /// Service class, e.g. `Retail` or `Pick & Pack`.
    pub service_type: Option<String>,
    pub product_name: Option<String>,
    /// Passengers on board.
    pub passenger_count: Option<f64>,
    /// Cost of one unit.
    pub unit_cost: Option<f64>,
    /// Units loaded per the standard specification.
    pub standard_qty: Option<f64>,
    /// Units consumed in flight; the training target.
    pub quantity_consumed: Option<f64>,
    /// Units returned unused.
    pub quantity_returned: Option<f64>,
    /// Free-text crew note; empty when the crew left none.
    pub crew_feedback: String,
}

impl ConsumptionRecord {
    /// Returns the value of a categorical attribute.
    pub fn categorical(&self, attribute: CategoricalAttribute) -> Option<&str> {
        match attribute {
            CategoricalAttribute::Origin => self.origin.as_deref(),
            CategoricalAttribute::FlightType => self.flight_type.as_deref(),
            CategoricalAttribute::ServiceType => self.service_type.as_deref(),
            CategoricalAttribute::ProductName => self.product_name.as_deref(),
        }
    }

    /// True when the consumed quantity is a usable demand signal (> 0).
    pub fn has_positive_consumption(&self) -> bool {
        matches!(self.quantity_consumed, Some(q) if q > 0.0)
    }
}

/// The full set of records loaded from one export.
pub type Corpus = Vec<ConsumptionRecord>;
