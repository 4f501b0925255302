//! Per-flight stocking plans.

use crate::error::ServingResult;
use crate::predictor::{DemandPredictor, PredictionRequest};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A product to stock and its unit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub product_name: String,
    pub unit_cost: f64,
}

/// A flight and the products to plan for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlanRequest {
    #[serde(default)]
    pub flight_id: String,
    pub origin: String,
    pub flight_type: String,
    pub service_type: String,
    pub passenger_count: f64,
    pub items: Vec<PlanItem>,
}

/// Predicted stock for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLine {
    pub product_name: String,
    pub unit_cost: f64,
    pub predicted_units: u64,
    /// `predicted_units * unit_cost`, rounded to cents.
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTotals {
    pub total_units: u64,
    pub total_cost: f64,
    /// Zero when the flight has no passengers.
    pub units_per_passenger: f64,
    pub cost_per_passenger: f64,
}

/// Stocking plan for one flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub flight_id: String,
    pub origin: String,
    pub flight_type: String,
    pub service_type: String,
    pub passenger_count: f64,
    pub lines: Vec<PlanLine>,
    pub totals: PlanTotals,
}

/// Plans for several flights plus fleet-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetPlan {
    pub flights: Vec<FlightPlan>,
    pub total_units: u64,
    pub total_cost: f64,
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn per_passenger(total: f64, passengers: f64) -> f64 {
    if passengers > 0.0 {
        cents(total / passengers)
    } else {
        0.0
    }
}

/// Predicts every item of `request`. An unknown category anywhere fails
/// the whole plan.
pub fn plan(predictor: &DemandPredictor, request: &FlightPlanRequest) -> ServingResult<FlightPlan> {
    let mut lines = Vec::with_capacity(request.items.len());
    let mut total_units = 0u64;
    let mut total_cost = 0.0;

    for item in &request.items {
        let units = predictor.predict(&PredictionRequest::new(
            request.origin.as_str(),
            request.flight_type.as_str(),
            request.service_type.as_str(),
            request.passenger_count,
            item.product_name.as_str(),
            item.unit_cost,
        ))?;
        let cost = units as f64 * item.unit_cost;
        total_units += units;
        total_cost += cost;
        lines.push(PlanLine {
            product_name: item.product_name.clone(),
            unit_cost: item.unit_cost,
            predicted_units: units,
            total_cost: cents(cost),
        });
    }

    info!(
        flight = %request.flight_id,
        items = lines.len(),
        total_units,
        total_cost = cents(total_cost),
        "Flight plan computed"
    );

    Ok(FlightPlan {
        flight_id: request.flight_id.clone(),
        origin: request.origin.clone(),
        flight_type: request.flight_type.clone(),
        service_type: request.service_type.clone(),
        passenger_count: request.passenger_count,
        lines,
        totals: PlanTotals {
            total_units,
            total_cost: cents(total_cost),
            units_per_passenger: per_passenger(total_units as f64, request.passenger_count),
            cost_per_passenger: per_passenger(total_cost, request.passenger_count),
        },
    })
}

/// Plans every flight; the first failing flight aborts the fleet plan.
pub fn plan_fleet(predictor: &DemandPredictor, requests: &[FlightPlanRequest]) -> ServingResult<FleetPlan> {
    let flights = requests
        .iter()
        .map(|r| plan(predictor, r))
        .collect::<ServingResult<Vec<_>>>()?;
    let total_units = flights.iter().map(|f| f.totals.total_units).sum();
    let total_cost = cents(flights.iter().map(|f| f.totals.total_cost).sum());
    Ok(FleetPlan {
        flights,
        total_units,
        total_cost,
    })
}
