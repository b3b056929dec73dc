//! End-to-end brewing scenarios over a wired calculation graph.

use brewflow::{formulas, wire, CalcDefinition, QuantityError, SnapshotStore};
use serde_json::{json, Value};

fn og_definition() -> CalcDefinition {
    CalcDefinition::native(
        "og",
        ["fermentables", "batch_gal", "efficiency_pct"],
        |args| {
            let batch_gal = args[1].as_f64().unwrap_or(0.0);
            let efficiency = args[2].as_f64().map(|pct| pct / 100.0);
            let og = formulas::original_gravity(&args[0], batch_gal, efficiency)?;
            Ok(og.into())
        },
    )
}

fn get_f64(registry: &brewflow::ResultRegistry, id: &str) -> f64 {
    registry
        .get(id)
        .and_then(|value| value.as_f64())
        .unwrap_or_else(|| panic!("no numeric value for `{}`", id))
}

#[test]
fn gravity_chain() {
    let store = SnapshotStore::new(json!({
        "fermentables": [{ "extract_points": 35.0, "weight_lb": 10.0 }],
        "batch_gal": 5.0,
        "efficiency_pct": 70.0,
    }));
    let graph = wire(&store, vec![og_definition()]).unwrap();
    let registry = graph.registry();

    assert!((get_f64(&registry, "og") - 1.049).abs() < 1e-9);

    // Adding grain raises the gravity on the next pass.
    store
        .replace(json!({
            "fermentables": [{ "extract_points": 35.0, "weight_lb": 12.0 }],
            "batch_gal": 5.0,
            "efficiency_pct": 70.0,
        }))
        .unwrap();
    assert!((get_f64(&registry, "og") - 1.0588).abs() < 1e-9);
}

#[test]
fn dependent_alcohol_calculations_share_one_pass() {
    let store = SnapshotStore::new(json!({ "og_reading": 1.060 }));
    let graph = wire(
        &store,
        vec![
            CalcDefinition::expr("og", ["og_reading"], "|g| g"),
            CalcDefinition::expr("fg", ["calc:og"], "|og| og - (og - 1) * 0.75"),
            CalcDefinition::expr("abv", ["calc:og", "calc:fg"], "|og, fg| (og - fg) * 131.25"),
        ],
    )
    .unwrap();
    let registry = graph.registry();

    assert!((get_f64(&registry, "fg") - 1.015).abs() < 1e-9);
    assert!((get_f64(&registry, "abv") - 5.90625).abs() < 1e-9);

    // After a new reading, `abv` reads the same pass's `og` and `fg`.
    store.replace(json!({ "og_reading": 1.070 })).unwrap();
    assert!((get_f64(&registry, "fg") - 1.0175).abs() < 1e-9);
    assert!((get_f64(&registry, "abv") - 6.890625).abs() < 1e-9);
}

#[test]
fn missing_fermentable_list_yields_the_baseline() {
    let store = SnapshotStore::new(json!({
        "batch_gal": 5.0,
        "efficiency_pct": 70.0,
    }));
    let graph = wire(&store, vec![og_definition()]).unwrap();

    // No fermentables yet: the body receives null and defaults, it does not
    // panic or poison the graph.
    assert_eq!(graph.registry().get("og"), Some(json!(1.0)));
}

#[test]
fn unrecognized_unit_surfaces_at_the_mutation_site() {
    let store = SnapshotStore::new(json!({
        "fermentables": [{
            "extract_points": 35.0,
            "weight": { "amount": 4.535_923_7, "unit": "kg" },
        }],
        "batch_gal": 5.0,
        "efficiency_pct": 70.0,
    }));
    let graph = wire(&store, vec![og_definition()]).unwrap();
    assert!((get_f64(&graph.registry(), "og") - 1.049).abs() < 1e-6);

    let err = store
        .replace(json!({
            "fermentables": [{
                "extract_points": 35.0,
                "weight": { "amount": 2.0, "unit": "stone" },
            }],
            "batch_gal": 5.0,
            "efficiency_pct": 70.0,
        }))
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<QuantityError>(),
        Some(&QuantityError::UnrecognizedUnit("stone".to_string()))
    );
    // The failed calculation keeps its previous value.
    assert!((get_f64(&graph.registry(), "og") - 1.049).abs() < 1e-6);
}

#[test]
fn unrecognized_unit_fails_wiring_too() {
    let store = SnapshotStore::new(json!({
        "fermentables": [{
            "extract_points": 35.0,
            "weight": { "amount": 2.0, "unit": "stone" },
        }],
        "batch_gal": 5.0,
    }));
    let err = wire(&store, vec![og_definition()]).unwrap_err();
    assert!(err.is::<QuantityError>());
}

#[test]
fn full_recipe_graph() {
    let store = SnapshotStore::new(json!({
        "fermentables": [
            { "extract_points": 35.0, "weight_lb": 9.0, "color_lovibond": 2.0 },
            { "extract_points": 34.0, "weight_lb": 1.0, "color_lovibond": 60.0 },
        ],
        "hops": [
            { "alpha_acid_pct": 5.5, "weight_oz": 1.0, "boil_min": 60.0 },
            { "alpha_acid_pct": 5.5, "weight_oz": 0.5, "boil_min": 15.0 },
        ],
        "batch_gal": 5.0,
        "efficiency_pct": 72.0,
    }));

    let graph = wire(
        &store,
        vec![
            og_definition(),
            CalcDefinition::expr("fg", ["calc:og"], "|og| og - (og - 1) * 0.75"),
            CalcDefinition::expr("abv", ["calc:og", "calc:fg"], "|og, fg| (og - fg) * 131.25"),
            CalcDefinition::native("srm", ["fermentables", "batch_gal"], |args| {
                let batch_gal = args[1].as_f64().unwrap_or(0.0);
                if batch_gal <= 0.0 {
                    return Ok(Value::Null);
                }
                let mcu = args[0]
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|item| {
                                let color = item
                                    .get("color_lovibond")
                                    .and_then(Value::as_f64)
                                    .unwrap_or(0.0);
                                let weight = item
                                    .get("weight_lb")
                                    .and_then(Value::as_f64)
                                    .unwrap_or(0.0);
                                color * weight
                            })
                            .sum::<f64>()
                    })
                    .unwrap_or(0.0)
                    / batch_gal;
                Ok(formulas::srm_morey(mcu).into())
            }),
            CalcDefinition::native("ibu", ["hops", "batch_gal", "calc:og"], |args| {
                let batch_gal = args[1].as_f64().unwrap_or(0.0);
                let og = args[2].as_f64().unwrap_or(1.050);
                let Some(hops) = args[0].as_array() else {
                    return Ok(json!(0.0));
                };
                let total: f64 = hops
                    .iter()
                    .map(|hop| {
                        let aa = hop
                            .get("alpha_acid_pct")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0);
                        let oz = hop.get("weight_oz").and_then(Value::as_f64).unwrap_or(0.0);
                        let minutes = hop.get("boil_min").and_then(Value::as_f64).unwrap_or(0.0);
                        formulas::ibu_tinseth(aa, oz, batch_gal, minutes, og)
                    })
                    .sum();
                Ok(json!(total))
            }),
        ],
    )
    .unwrap();
    let registry = graph.registry();

    let og = get_f64(&registry, "og");
    let abv = get_f64(&registry, "abv");
    let srm = get_f64(&registry, "srm");
    let ibu = get_f64(&registry, "ibu");

    // Sanity ranges for a 5-gallon amber ale.
    assert!(og > 1.045 && og < 1.056, "og = {}", og);
    assert!(abv > 4.0 && abv < 6.0, "abv = {}", abv);
    assert!(srm > 8.0 && srm < 14.0, "srm = {}", srm);
    assert!(ibu > 15.0 && ibu < 30.0, "ibu = {}", ibu);

    // A bigger grain bill moves the whole chain, including IBU utilization.
    let ibu_before = ibu;
    store
        .replace(json!({
            "fermentables": [
                { "extract_points": 35.0, "weight_lb": 12.0, "color_lovibond": 2.0 },
                { "extract_points": 34.0, "weight_lb": 1.0, "color_lovibond": 60.0 },
            ],
            "hops": [
                { "alpha_acid_pct": 5.5, "weight_oz": 1.0, "boil_min": 60.0 },
                { "alpha_acid_pct": 5.5, "weight_oz": 0.5, "boil_min": 15.0 },
            ],
            "batch_gal": 5.0,
            "efficiency_pct": 72.0,
        }))
        .unwrap();

    assert!(get_f64(&registry, "og") > og);
    // Higher gravity lowers hop utilization.
    assert!(get_f64(&registry, "ibu") < ibu_before);
}
