//! Pure brewing formulas, consumed as opaque calculation bodies.
//!
//! These are stateless functions over plain numbers and document fragments.
//! They default missing inputs internally (no fermentables yet is the normal
//! state of a recipe being edited) but treat malformed physical quantities
//! as hard errors that propagate out of the triggering recomputation.

use serde_json::Value;

use crate::error::QuantityError;
use crate::units;

/// Mash efficiency assumed when the document does not specify one.
pub const DEFAULT_EFFICIENCY: f64 = 0.70;

/// Apparent attenuation assumed when the document does not specify one.
pub const DEFAULT_ATTENUATION: f64 = 0.75;

/// Original gravity from a fermentable list.
///
/// Each fermentable contributes `extract_points * weight_lb`; weights may
/// also be `{ amount, unit }` objects under `weight`. The summed points are
/// scaled by mash efficiency and divided by batch gallons. A missing or
/// empty fermentable list, or a non-positive batch size, yields the 1.000
/// baseline rather than an error.
pub fn original_gravity(
    fermentables: &Value,
    batch_gal: f64,
    efficiency: Option<f64>,
) -> Result<f64, QuantityError> {
    let efficiency = efficiency.unwrap_or(DEFAULT_EFFICIENCY);
    let Some(items) = fermentables.as_array() else {
        return Ok(1.0);
    };
    if batch_gal <= 0.0 {
        return Ok(1.0);
    }
    let mut points = 0.0;
    for item in items {
        let extract = item
            .get("extract_points")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let weight = match item.get("weight") {
            Some(quantity) => units::weight_lb(quantity)?,
            None => item.get("weight_lb").and_then(Value::as_f64).unwrap_or(0.0),
        };
        points += extract * weight;
    }
    Ok(1.0 + points * efficiency / batch_gal / 1000.0)
}

/// Final gravity from original gravity and apparent attenuation.
pub fn final_gravity(og: f64, attenuation: Option<f64>) -> f64 {
    og - (og - 1.0) * attenuation.unwrap_or(DEFAULT_ATTENUATION)
}

/// Alcohol by volume, percent.
pub fn abv(og: f64, fg: f64) -> f64 {
    (og - fg) * 131.25
}

/// Beer color in SRM from malt color units, per Morey.
pub fn srm_morey(mcu: f64) -> f64 {
    1.4922 * mcu.powf(0.6859)
}

/// Bitterness in IBU for one hop addition, per Tinseth.
///
/// `alpha_acid_pct` is the hop's alpha acid rating in percent, `hop_oz` the
/// addition weight in ounces, `boil_min` the boil time of the addition, and
/// `wort_gravity` the boil gravity.
pub fn ibu_tinseth(
    alpha_acid_pct: f64,
    hop_oz: f64,
    batch_gal: f64,
    boil_min: f64,
    wort_gravity: f64,
) -> f64 {
    if batch_gal <= 0.0 {
        return 0.0;
    }
    let bigness = 1.65 * 0.000_125_f64.powf(wort_gravity - 1.0);
    let boil_factor = (1.0 - (-0.04 * boil_min).exp()) / 4.15;
    let utilization = bigness * boil_factor;
    let mg_per_l = alpha_acid_pct / 100.0 * hop_oz * 7490.0 / batch_gal;
    utilization * mg_per_l
}
