use std::collections::BTreeMap;
use std::sync::OnceLock;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use xraysim::units::{CM, DENSITY, KEV, MASS_ATTENUATION, MEV};
use xraysim::{Mixture, ReferenceData, XraySimError, density_from_hu};

fn data() -> &'static ReferenceData {
    static DATA: OnceLock<ReferenceData> = OnceLock::new();
    DATA.get_or_init(|| ReferenceData::load().unwrap())
}

#[test]
fn test_compound_weights_of_water() {
    let water = Mixture::from_compound_formula(data().elements(), "H2O").unwrap();
    let h = 2.0 * 1.00794;
    let o = 15.9994;
    assert_relative_eq!(water.weight(1), h / (h + o), max_relative = 1e-12);
    assert_relative_eq!(water.weight(8), o / (h + o), max_relative = 1e-12);
    assert_eq!(water.weight(26), 0.0);
    assert_relative_eq!(water.weights().values().sum::<f64>(), 1.0, max_relative = 1e-12);
}

#[test]
fn test_water_mass_attenuation_matches_table() {
    let water = Mixture::from_compound_formula(data().elements(), "H2O").unwrap();
    let mu = water
        .mass_attenuation_coefficient(data().elements(), 100.0 * KEV)
        .unwrap();
    assert_relative_eq!(mu / MASS_ATTENUATION, 0.1707, max_relative = 1e-3);
}

#[test]
fn test_mixture_weights_are_normalised() {
    let alloy = Mixture::from_mixture_formula(data().elements(), "Ti90Al6V4").unwrap();
    assert_relative_eq!(alloy.weight(22), 0.90, max_relative = 1e-12);
    assert_relative_eq!(alloy.weight(13), 0.06, max_relative = 1e-12);
    assert_relative_eq!(alloy.weight(23), 0.04, max_relative = 1e-12);

    let fractions = Mixture::from_mixture_formula(data().elements(), "Ti0.9 Al0.06/V0.04").unwrap();
    for z in [13, 22, 23] {
        assert_relative_eq!(alloy.weight(z), fractions.weight(z), max_relative = 1e-12);
    }
    assert_relative_eq!(alloy.molar_mass(), fractions.molar_mass(), max_relative = 1e-12);
}

#[test]
fn test_mixture_repeated_symbol_accumulates() {
    let mixture = Mixture::from_mixture_formula(data().elements(), "H1O4H1").unwrap();
    assert_relative_eq!(mixture.weight(1), 1.0 / 3.0, max_relative = 1e-12);
    assert_relative_eq!(mixture.weight(8), 2.0 / 3.0, max_relative = 1e-12);
}

#[test]
fn test_mixture_accepts_names_and_numbers() {
    let mut weights = std::collections::HashMap::new();
    weights.insert("hydrogen".to_string(), 1.0);
    weights.insert("8".to_string(), 1.0);
    let mixture = Mixture::from_named_weights(data().elements(), &weights).unwrap();
    assert_relative_eq!(mixture.weight(1), 0.5);
    assert_relative_eq!(mixture.weight(8), 0.5);
}

#[test]
fn test_invalid_formulas() {
    let elements = data().elements();
    assert!(matches!(
        Mixture::from_mixture_formula(elements, "Ti90Al"),
        Err(XraySimError::InvalidFormula(_))
    ));
    assert!(matches!(
        Mixture::from_compound_formula(elements, "H2-O"),
        Err(XraySimError::InvalidFormula(_))
    ));
    assert!(matches!(
        Mixture::from_compound_formula(elements, "Xx2O"),
        Err(XraySimError::UnknownElement(_))
    ));
    assert!(matches!(
        Mixture::from_weights(elements, &BTreeMap::new()),
        Err(XraySimError::InvalidFormula(_))
    ));
}

#[test]
fn test_mixture_linear_attenuation_needs_density() {
    let mut water = Mixture::from_compound_formula(data().elements(), "H2O").unwrap();
    assert!(matches!(
        water.linear_attenuation_coefficient(data().elements(), 100.0 * KEV),
        Err(XraySimError::MissingDensity(_))
    ));
    water.set_density(1.0 * DENSITY);
    let mu = water
        .linear_attenuation_coefficient(data().elements(), 100.0 * KEV)
        .unwrap();
    assert_relative_eq!(mu * CM, 0.1707, max_relative = 1e-3);
    water.set_density(-1.0);
    assert_eq!(water.density(), None);
}

#[test]
fn test_tissue_interval_lookup() {
    let materials = data().materials();
    assert_eq!(materials.len(), 24);

    let air = materials.material(-1000).unwrap();
    assert_eq!((air.min_hu(), air.max_hu()), (-1050, -951));
    assert!(air.contains(-1000));

    let soft = materials.material(10).unwrap();
    assert_eq!((soft.min_hu(), soft.max_hu()), (8, 18));

    // Outside the table the first and last intervals apply.
    assert_eq!(materials.material(-2000).unwrap().min_hu(), -1050);
    assert_eq!(materials.material(i16::MAX).unwrap().max_hu(), 3000);
}

#[test]
fn test_tissue_compositions_are_normalised() {
    for material in data().materials().iter() {
        let sum: f64 = material.mixture().weights().values().sum();
        assert_relative_eq!(sum, 1.0, max_relative = 1e-9);
    }
}

#[test]
fn test_bone_attenuates_more_than_soft_tissue() {
    let materials = data().materials();
    let elements = data().elements();
    let soft = materials
        .mass_attenuation_coefficient(elements, 10, 60.0 * KEV)
        .unwrap();
    let bone = materials
        .mass_attenuation_coefficient(elements, 1500, 60.0 * KEV)
        .unwrap();
    assert!(bone > soft, "bone {bone} soft {soft}");
}

#[test]
fn test_density_from_hu() {
    assert_abs_diff_eq!(density_from_hu(0.0) / DENSITY, 1.018, epsilon = 1e-12);
    assert_abs_diff_eq!(density_from_hu(-1000.0) / DENSITY, 1.21e-3, epsilon = 1e-12);
    assert!(density_from_hu(1000.0) > density_from_hu(100.0));
}

#[test]
fn test_mu_water_interpolation() {
    let water = data().mu_water();
    assert_eq!(water.len(), 36);
    assert_relative_eq!(
        water.linear_interpolation(100.0 * KEV).unwrap() * CM,
        0.1707,
        max_relative = 1e-9
    );
    assert_relative_eq!(
        water.log_linear_interpolation(1.0 * MEV).unwrap() * CM,
        0.07072,
        max_relative = 1e-9
    );
    // Clamped outside the table.
    let first = water.first().unwrap();
    assert_relative_eq!(
        water.linear_interpolation(0.1 * KEV).unwrap(),
        first.coefficient()
    );
    let last = water.last().unwrap();
    assert_relative_eq!(
        water.log_linear_interpolation(100.0 * MEV).unwrap(),
        last.coefficient()
    );
}

#[test]
fn test_hounsfield_conversion_with_water() {
    let water = data().mu_water();
    let energy = 80.0 * KEV;
    let mu_w = water.linear_interpolation(energy).unwrap();
    assert_relative_eq!(water.mu_from_hu(0.0, energy).unwrap(), mu_w);
    assert_relative_eq!(water.hu_from_mu(2.0 * mu_w, energy).unwrap(), 1000.0, max_relative = 1e-12);
    assert_relative_eq!(water.hu_from_mu(0.0, energy).unwrap(), -1000.0, max_relative = 1e-12);
}

#[test]
fn test_density_reference_pairs() {
    for (hu, reference) in [(-741.0, 0.26), (-98.0, 0.93), (100.0, 1.12), (1524.0, 1.92)] {
        let density = density_from_hu(hu) / DENSITY;
        assert_relative_eq!(density, reference, max_relative = 0.05);
    }
}

#[test]
fn test_silicon_carbide_between_constituents() {
    let elements = data().elements();
    let sic = Mixture::from_compound_formula(elements, "SiC").unwrap();
    let energy = 100.0 * KEV;
    let mu = sic.mass_attenuation_coefficient(elements, energy).unwrap() / MASS_ATTENUATION;
    let si = 28.0855 / (28.0855 + 12.0107);
    assert_relative_eq!(mu, si * 0.1835 + (1.0 - si) * 0.1514, max_relative = 0.1);
}

#[test]
fn test_attenuation_decreases_in_compton_region() {
    let elements = data().elements();
    for symbol in ["H", "C", "O", "Al", "Fe", "I"] {
        let element = elements.find(symbol).unwrap();
        let mut previous = f64::INFINITY;
        for kev in [200.0, 300.0, 500.0, 800.0, 1000.0] {
            let mu = element.mass_attenuation_coefficient(kev * KEV).unwrap();
            assert!(mu < previous, "{symbol} at {kev} keV");
            previous = mu;
        }
    }
}
