use std::sync::OnceLock;

use approx::assert_relative_eq;
use xraysim::units::{CM, DENSITY, KEV, MASS_ATTENUATION};
use xraysim::{AttenuationSource, Mixture, PhotonCrossSection, ReferenceData, XraySimError};

fn data() -> &'static ReferenceData {
    static DATA: OnceLock<ReferenceData> = OnceLock::new();
    DATA.get_or_init(|| ReferenceData::load().unwrap())
}

#[test]
fn test_unset_cross_section() {
    let cs = PhotonCrossSection::new();
    assert!(!cs.is_set());
    assert!(matches!(
        cs.linear_attenuation_coefficient(data(), 100.0 * KEV),
        Err(XraySimError::NoPropertiesSet)
    ));
    assert!(matches!(cs.density(data()), Err(XraySimError::NoPropertiesSet)));
}

#[test]
fn test_element_uses_tabulated_density() {
    let mut cs = PhotonCrossSection::new();
    cs.use_element(data(), "Fe").unwrap();
    assert_eq!(cs.source(), Some(&AttenuationSource::Element(26)));
    assert_eq!(cs.label(), "Element: Fe");
    assert_relative_eq!(cs.density(data()).unwrap() / DENSITY, 7.874);
    let mu = cs.linear_attenuation_coefficient(data(), 100.0 * KEV).unwrap();
    assert_relative_eq!(mu * CM, 0.3717 * 7.874, max_relative = 1e-9);
    assert_relative_eq!(cs.molar_mass(data()).unwrap().unwrap(), 55.845);
}

#[test]
fn test_element_by_atomic_number() {
    let mut by_symbol = PhotonCrossSection::new();
    by_symbol.use_element(data(), "Pb").unwrap();
    let mut by_z = PhotonCrossSection::new();
    by_z.use_element_z(data(), 82).unwrap();
    assert_eq!(by_symbol, by_z);
}

#[test]
fn test_unknown_element_keeps_previous_state() {
    let mut cs = PhotonCrossSection::new();
    cs.use_element(data(), "O").unwrap();
    assert!(matches!(
        cs.use_element(data(), "Xx"),
        Err(XraySimError::UnknownElement(_))
    ));
    assert_eq!(cs.source(), Some(&AttenuationSource::Element(8)));
}

#[test]
fn test_density_override() {
    let mut cs = PhotonCrossSection::new();
    cs.use_element(data(), "Fe").unwrap();
    cs.set_density(1.0 * DENSITY);
    let mu = cs.linear_attenuation_coefficient(data(), 100.0 * KEV).unwrap();
    assert_relative_eq!(mu * CM, 0.3717, max_relative = 1e-9);

    // A negative density clears the override.
    cs.set_density(-1.0);
    assert_eq!(cs.density_override(), None);
    assert_relative_eq!(cs.density(data()).unwrap() / DENSITY, 7.874);
}

#[test]
fn test_switching_source_resets_density() {
    let mut cs = PhotonCrossSection::new();
    cs.use_element(data(), "Fe").unwrap();
    cs.set_density(2.0 * DENSITY);
    cs.use_element(data(), "Cu").unwrap();
    assert_eq!(cs.density_override(), None);
}

#[test]
fn test_compound_needs_density() {
    let mut cs = PhotonCrossSection::new();
    cs.use_compound(data(), "H2O").unwrap();
    assert_eq!(cs.molar_mass(data()).unwrap().map(|m| m > 0.0), Some(true));
    assert!(matches!(
        cs.linear_attenuation_coefficient(data(), 100.0 * KEV),
        Err(XraySimError::MissingDensity(_))
    ));
    cs.set_density(1.0 * DENSITY);
    let water = data().mu_water().linear_interpolation(100.0 * KEV).unwrap();
    let mu = cs.linear_attenuation_coefficient(data(), 100.0 * KEV).unwrap();
    assert_relative_eq!(mu, water, max_relative = 1e-3);
}

#[test]
fn test_mixture_with_density() {
    let mut cs = PhotonCrossSection::new();
    cs.use_mixture(data(), "Ti90Al6V4").unwrap();
    cs.set_density(4.42 * DENSITY);
    let mu = cs.linear_attenuation_coefficient(data(), 100.0 * KEV).unwrap();
    assert!(mu > 0.0);

    let mixture = Mixture::from_mixture_formula(data().elements(), "Ti90Al6V4")
        .unwrap()
        .with_density(4.42 * DENSITY);
    let mut weights = PhotonCrossSection::new();
    weights.use_mixture_weights(mixture, "Ti-6Al-4V");
    assert_relative_eq!(
        weights.linear_attenuation_coefficient(data(), 100.0 * KEV).unwrap(),
        mu,
        max_relative = 1e-12
    );
}

#[test]
fn test_hounsfield_units() {
    let mut cs = PhotonCrossSection::new();
    cs.use_hu(0);
    assert_eq!(cs.label(), "HU: 0");
    assert_relative_eq!(cs.density(data()).unwrap() / DENSITY, 1.018);
    let soft = cs.linear_attenuation_coefficient(data(), 80.0 * KEV).unwrap();

    cs.use_hu(1200);
    let bone = cs.linear_attenuation_coefficient(data(), 80.0 * KEV).unwrap();
    assert!(bone > soft * 1.5, "bone {bone} soft tissue {soft}");
}

#[test]
fn test_coefficients_given_directly() {
    let mut cs = PhotonCrossSection::new();
    cs.use_linear_attenuation_coefficient(0.5 / CM);
    assert_relative_eq!(
        cs.linear_attenuation_coefficient(data(), 1.0 * KEV).unwrap(),
        0.5 / CM
    );
    assert!(cs.molar_mass(data()).unwrap().is_none());
    assert!(matches!(
        cs.mass_attenuation_coefficient(data(), 1.0 * KEV),
        Err(XraySimError::MissingDensity(_))
    ));
    cs.set_density(2.0 * DENSITY);
    assert_relative_eq!(
        cs.mass_attenuation_coefficient(data(), 1.0 * KEV).unwrap() / MASS_ATTENUATION,
        0.25,
        max_relative = 1e-12
    );

    cs.use_mass_attenuation_coefficient(0.2 * MASS_ATTENUATION);
    assert!(matches!(
        cs.linear_attenuation_coefficient(data(), 1.0 * KEV),
        Err(XraySimError::MissingDensity(_))
    ));
    cs.set_density(3.0 * DENSITY);
    assert_relative_eq!(
        cs.linear_attenuation_coefficient(data(), 1.0 * KEV).unwrap() * CM,
        0.6,
        max_relative = 1e-12
    );
}

#[test]
fn test_equality_ignores_label() {
    let mut a = PhotonCrossSection::new();
    a.use_compound(data(), "H2O").unwrap();
    let mut b = PhotonCrossSection::new();
    b.use_mixture_weights(
        Mixture::from_compound_formula(data().elements(), "H2O").unwrap(),
        "water",
    );
    assert_eq!(a, b);
    b.set_density(1.0 * DENSITY);
    assert_ne!(a, b);
}

#[test]
fn test_reset() {
    let mut cs = PhotonCrossSection::new();
    cs.use_hu(40);
    cs.reset();
    assert!(!cs.is_set());
    assert!(cs.label().is_empty());
}
