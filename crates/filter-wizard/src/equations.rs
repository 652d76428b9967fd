//! Closed-form component value derivation for the supported topologies
//!
//! Each topology fixes some component values by user choice and derives the
//! rest from the target gain and cutoff frequency. The functions here are pure:
//! inputs are validated up front so no division by zero reaches the formulas.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

use crate::error::{Result, WizardError};
use crate::topology::Topology;

pub const MIN_GAIN_EXCLUSIVE: f64 = 1.0;
pub const MAX_GAIN: f64 = 1000.0;
pub const MIN_FREQ_EXP: f64 = 0.0;
pub const MAX_FREQ_EXP: f64 = 5.0;

/// Component property written on the simulation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    #[serde(rename = "resistance_value")]
    Resistance,
    #[serde(rename = "capacitance_value")]
    Capacitance,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Resistance => "resistance_value",
            PropertyKind::Capacitance => "capacitance_value",
        }
    }

    /// SI unit symbol
    pub fn unit(&self) -> &'static str {
        match self {
            PropertyKind::Resistance => "Ω",
            PropertyKind::Capacitance => "F",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One component property assignment, in ohms or farads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValue {
    pub component: String,
    pub property: PropertyKind,
    pub value: f64,
}

impl ComponentValue {
    pub fn resistance(component: &str, ohms: f64) -> Self {
        Self {
            component: component.to_string(),
            property: PropertyKind::Resistance,
            value: ohms,
        }
    }

    pub fn capacitance(component: &str, farads: f64) -> Self {
        Self {
            component: component.to_string(),
            property: PropertyKind::Capacitance,
            value: farads,
        }
    }
}

/// Ordered component assignments; insertion order is the write order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentValueSet {
    entries: Vec<ComponentValue>,
}

impl ComponentValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: ComponentValue) {
        self.entries.push(value);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComponentValue> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry for the named component
    pub fn get(&self, component: &str) -> Option<&ComponentValue> {
        self.entries.iter().find(|v| v.component == component)
    }
}

impl FromIterator<ComponentValue> for ComponentValueSet {
    fn from_iter<I: IntoIterator<Item = ComponentValue>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ComponentValueSet {
    type Item = &'a ComponentValue;
    type IntoIter = std::slice::Iter<'a, ComponentValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Shared design targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    /// Voltage gain ratio, in (1, 1000]
    pub gain: f64,
    /// Cutoff exponent; the cutoff is 10^freq_exp Hz, in [0, 5]
    pub freq_exp: f64,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            gain: 100.0,
            freq_exp: 2.0,
        }
    }
}

impl Targets {
    pub fn validate(&self) -> Result<()> {
        if !self.gain.is_finite() || self.gain <= MIN_GAIN_EXCLUSIVE || self.gain > MAX_GAIN {
            return Err(WizardError::invalid(
                "gain",
                format!("{} is outside ({MIN_GAIN_EXCLUSIVE}, {MAX_GAIN}]", self.gain),
            ));
        }
        if !self.freq_exp.is_finite() || self.freq_exp < MIN_FREQ_EXP || self.freq_exp > MAX_FREQ_EXP {
            return Err(WizardError::invalid(
                "freq_exp",
                format!("{} is outside [{MIN_FREQ_EXP}, {MAX_FREQ_EXP}]", self.freq_exp),
            ));
        }
        Ok(())
    }

    pub fn cutoff_hz(&self) -> f64 {
        cutoff_hz(self.freq_exp)
    }

    pub fn gain_db(&self) -> f64 {
        gain_db(self.gain)
    }
}

/// Voltage ratio in decibels
pub fn gain_db(ratio: f64) -> f64 {
    20.0 * ratio.log10()
}

/// Cutoff frequency in Hz for a slider exponent
pub fn cutoff_hz(freq_exp: f64) -> f64 {
    10f64.powf(freq_exp)
}

/// User-chosen component values, per topology. Capacitances are in nF, resistances in ohms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topology", rename_all = "snake_case")]
pub enum FreeValues {
    #[serde(rename = "sallen_key_lowpass")]
    SallenKey { c1: f64, r3: f64 },
    #[serde(rename = "boctor_notch_lowpass")]
    BoctorNotch { r6: f64, r5: f64, c1: f64 },
    #[serde(rename = "multiple_feedback_lowpass")]
    MultipleFeedback { c5: f64 },
}

impl FreeValues {
    pub fn topology(&self) -> Topology {
        match self {
            FreeValues::SallenKey { .. } => Topology::SallenKeyLowpass,
            FreeValues::BoctorNotch { .. } => Topology::BoctorNotchLowpass,
            FreeValues::MultipleFeedback { .. } => Topology::MultipleFeedbackLowpass,
        }
    }

    /// Slider defaults: the low end of each range
    pub fn defaults(topology: Topology) -> Self {
        match topology {
            Topology::SallenKeyLowpass => FreeValues::SallenKey { c1: 1.0, r3: 100.0 },
            Topology::BoctorNotchLowpass => FreeValues::BoctorNotch {
                r6: 100.0,
                r5: 100.0,
                c1: 1.0,
            },
            Topology::MultipleFeedbackLowpass => FreeValues::MultipleFeedback { c5: 1.0 },
        }
    }

    /// Slider defaults for `topology`, overridden by any named entries in
    /// `params`. Names the topology does not use are rejected.
    pub fn from_params(topology: Topology, params: &BTreeMap<String, f64>) -> Result<Self> {
        let mut free = Self::defaults(topology);
        for (name, &value) in params {
            let slot = match (&mut free, name.as_str()) {
                (FreeValues::SallenKey { c1, .. }, "c1") => c1,
                (FreeValues::SallenKey { r3, .. }, "r3") => r3,
                (FreeValues::BoctorNotch { r6, .. }, "r6") => r6,
                (FreeValues::BoctorNotch { r5, .. }, "r5") => r5,
                (FreeValues::BoctorNotch { c1, .. }, "c1") => c1,
                (FreeValues::MultipleFeedback { c5 }, "c5") => c5,
                _ => {
                    return Err(WizardError::invalid(
                        "params",
                        format!("{} has no free parameter {name:?}", topology.design_name()),
                    ))
                }
            };
            *slot = value;
        }
        Ok(free)
    }

    fn validate(&self) -> Result<()> {
        let checks: &[(&'static str, f64)] = match self {
            FreeValues::SallenKey { c1, r3 } => &[("c1", *c1), ("r3", *r3)],
            FreeValues::BoctorNotch { r6, r5, c1 } => &[("r6", *r6), ("r5", *r5), ("c1", *c1)],
            FreeValues::MultipleFeedback { c5 } => &[("c5", *c5)],
        };
        for &(name, value) in checks {
            if !value.is_finite() || value <= 0.0 {
                return Err(WizardError::invalid(name, format!("{value} must be positive")));
            }
        }
        Ok(())
    }
}

/// Everything needed to derive one topology's component values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignParameters {
    #[serde(flatten)]
    pub free: FreeValues,
    #[serde(flatten)]
    pub targets: Targets,
}

impl DesignParameters {
    pub fn topology(&self) -> Topology {
        self.free.topology()
    }
}

/// Validate the parameters and derive the full component value set
pub fn compute(params: &DesignParameters) -> Result<ComponentValueSet> {
    params.targets.validate()?;
    params.free.validate()?;

    let Targets { gain, freq_exp } = params.targets;
    let values = match params.free {
        FreeValues::SallenKey { c1, r3 } => sallen_key(c1, r3, gain, freq_exp),
        FreeValues::BoctorNotch { r6, r5, c1 } => boctor_notch(r6, r5, c1, gain, freq_exp),
        FreeValues::MultipleFeedback { c5 } => multiple_feedback(c5, gain, freq_exp),
    };

    // Signed results pass through; only overflow and division by zero stop here
    if let Some(bad) = values.iter().find(|v| !v.value.is_finite()) {
        return Err(WizardError::InvalidParameter {
            name: "targets",
            reason: format!(
                "derived {} {} = {} is not finite",
                bad.component, bad.property, bad.value
            ),
        });
    }
    Ok(values)
}

/// Sallen-Key lowpass. Order: c1, r3, c2, r1, r2, r4.
pub fn sallen_key(c1_nf: f64, r3: f64, gain: f64, freq_exp: f64) -> ComponentValueSet {
    let c1 = c1_nf * 1e-9;
    let freq = cutoff_hz(freq_exp);
    let k = c1 * (2.0 * PI * freq);
    let m = 0.25 + (gain - 1.0);
    let c2 = m * c1;
    let r1 = 2.0 / k;
    let r2 = 1.0 / (2.0 * m * k);
    let r4 = r3 / (gain - 1.0);

    [
        ComponentValue::capacitance("c1", c1),
        ComponentValue::resistance("r3", r3),
        ComponentValue::capacitance("c2", c2),
        ComponentValue::resistance("r1", r1),
        ComponentValue::resistance("r2", r2),
        ComponentValue::resistance("r4", r4),
    ]
    .into_iter()
    .collect()
}

/// Boctor notch lowpass. Order: r6, r5, c1, r4, r2, r1, r3, c2.
///
/// R1 carries a factor of 100 on R6/R4 that the displayed textbook relation
/// does not have. Simulated designs were tuned against this form, so it is kept.
pub fn boctor_notch(r6: f64, r5: f64, c1_nf: f64, _gain: f64, freq_exp: f64) -> ComponentValueSet {
    let c1 = c1_nf * 1e-9;
    let freq = cutoff_hz(freq_exp);
    let r4 = 1.0 / ((2.0 * PI * freq) * c1 * 2.0);
    let r2 = 1.0 / ((1.0 / r4) + (1.0 / r6));
    let r1 = boctor_r1(r6, r4);
    let c2 = 4.0 * r4 * c1 / r6;
    let r3 = r5 * ((r6 / r1) + (2.0 * (c1 / c2)));

    [
        ComponentValue::resistance("r6", r6),
        ComponentValue::resistance("r5", r5),
        ComponentValue::capacitance("c1", c1),
        ComponentValue::resistance("r4", r4),
        ComponentValue::resistance("r2", r2),
        ComponentValue::resistance("r1", r1),
        ComponentValue::resistance("r3", r3),
        ComponentValue::capacitance("c2", c2),
    ]
    .into_iter()
    .collect()
}

/// Boctor R1 as computed, with the x100 factor
pub fn boctor_r1(r6: f64, r4: f64) -> f64 {
    0.5 * (100.0 * (r6 / r4) - 1.0)
}

/// Boctor R1 as displayed in the equation sheet
pub fn boctor_r1_textbook(r6: f64, r4: f64) -> f64 {
    0.5 * ((r6 / r4) - 1.0)
}

/// Multiple-feedback lowpass. The chosen C5 is written as c2. Order: c2, c1, r1, r3, r2.
pub fn multiple_feedback(c5_nf: f64, gain: f64, freq_exp: f64) -> ComponentValueSet {
    let c2 = c5_nf * 1e-9;
    let freq = cutoff_hz(freq_exp);
    let k = (2.0 * PI * freq) * c2;
    let c1 = 4.0 * (gain + 1.0) * c2;
    let r1 = 1.0 / (2.0 * gain * k);
    let r3 = 1.0 / (2.0 * (gain + 1.0) * k);
    let r2 = 1.0 / (2.0 * k);

    [
        ComponentValue::capacitance("c2", c2),
        ComponentValue::capacitance("c1", c1),
        ComponentValue::resistance("r1", r1),
        ComponentValue::resistance("r3", r3),
        ComponentValue::resistance("r2", r2),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rel(actual: f64, expected: f64, what: &str) {
        let rel = ((actual - expected) / expected).abs();
        assert!(rel < 1e-3, "{what}: got {actual:e}, expected {expected:e} (rel err {rel:e})");
    }

    fn value(set: &ComponentValueSet, name: &str) -> f64 {
        set.get(name).unwrap_or_else(|| panic!("missing {name}")).value
    }

    #[test]
    fn test_sallen_key_reference_values() {
        let params = DesignParameters {
            free: FreeValues::SallenKey { c1: 10.0, r3: 1000.0 },
            targets: Targets { gain: 100.0, freq_exp: 2.0 },
        };
        let set = compute(&params).unwrap();

        let k = 1e-8 * 2.0 * PI * 100.0;
        assert_rel(value(&set, "c1"), 1e-8, "c1");
        assert_rel(value(&set, "r3"), 1000.0, "r3");
        assert_rel(value(&set, "c2"), 9.925e-7, "c2");
        assert_rel(value(&set, "r1"), 3.1831e5, "r1");
        assert_rel(value(&set, "r2"), 1.0 / (2.0 * 99.25 * k), "r2");
        assert_rel(value(&set, "r2"), 801.8, "r2");
        assert_rel(value(&set, "r4"), 1000.0 / 99.0, "r4");
    }

    #[test]
    fn test_sallen_key_order_and_kinds() {
        let set = sallen_key(10.0, 1000.0, 100.0, 2.0);
        let names: Vec<_> = set.iter().map(|v| v.component.as_str()).collect();
        assert_eq!(names, ["c1", "r3", "c2", "r1", "r2", "r4"]);
        assert_eq!(set.get("c2").unwrap().property, PropertyKind::Capacitance);
        assert_eq!(set.get("r4").unwrap().property, PropertyKind::Resistance);
    }

    #[test]
    fn test_multiple_feedback_reference_values() {
        let params = DesignParameters {
            free: FreeValues::MultipleFeedback { c5: 1.0 },
            targets: Targets { gain: 10.0, freq_exp: 3.0 },
        };
        let set = compute(&params).unwrap();

        let names: Vec<_> = set.iter().map(|v| v.component.as_str()).collect();
        assert_eq!(names, ["c2", "c1", "r1", "r3", "r2"]);
        assert_rel(value(&set, "c2"), 1e-9, "c2");
        assert_rel(value(&set, "c1"), 4.4e-8, "c1");
        assert_rel(value(&set, "r1"), 7957.7, "r1");
        assert_rel(value(&set, "r3"), 7234.3, "r3");
        assert_rel(value(&set, "r2"), 79577.5, "r2");
    }

    #[test]
    fn test_boctor_keeps_scaled_r1() {
        let params = DesignParameters {
            free: FreeValues::BoctorNotch { r6: 1000.0, r5: 1000.0, c1: 10.0 },
            targets: Targets { gain: 100.0, freq_exp: 3.0 },
        };
        let set = compute(&params).unwrap();

        let names: Vec<_> = set.iter().map(|v| v.component.as_str()).collect();
        assert_eq!(names, ["r6", "r5", "c1", "r4", "r2", "r1", "r3", "c2"]);

        assert_rel(value(&set, "r4"), 7957.747, "r4");
        assert_rel(value(&set, "r2"), 888.365, "r2");
        assert_rel(value(&set, "r1"), 5.7832, "r1");
        assert_rel(value(&set, "c2"), 3.18310e-7, "c2");
        assert_rel(value(&set, "r3"), 172977.9, "r3");

        let r4 = value(&set, "r4");
        assert_rel(value(&set, "r1"), boctor_r1(1000.0, r4), "r1");
        assert!(boctor_r1_textbook(1000.0, r4) < 0.0, "textbook form differs from the computed one");
    }

    #[test]
    fn test_unity_gain_rejected_before_computation() {
        for free in [
            FreeValues::SallenKey { c1: 10.0, r3: 1000.0 },
            FreeValues::MultipleFeedback { c5: 1.0 },
            FreeValues::BoctorNotch { r6: 1000.0, r5: 1000.0, c1: 10.0 },
        ] {
            let params = DesignParameters {
                free,
                targets: Targets { gain: 1.0, freq_exp: 2.0 },
            };
            let err = compute(&params).unwrap_err();
            assert!(
                matches!(err, WizardError::InvalidParameter { name: "gain", .. }),
                "unexpected error {err}"
            );
        }
    }

    #[test]
    fn test_target_domain_edges() {
        assert!(Targets { gain: 1.000001, freq_exp: 0.0 }.validate().is_ok());
        assert!(Targets { gain: 1000.0, freq_exp: 5.0 }.validate().is_ok());
        assert!(Targets { gain: 1000.1, freq_exp: 2.0 }.validate().is_err());
        assert!(Targets { gain: 0.5, freq_exp: 2.0 }.validate().is_err());
        assert!(Targets { gain: f64::NAN, freq_exp: 2.0 }.validate().is_err());
        assert!(Targets { gain: 10.0, freq_exp: 5.5 }.validate().is_err());
        assert!(Targets { gain: 10.0, freq_exp: -0.1 }.validate().is_err());
    }

    #[test]
    fn test_non_positive_free_value_rejected() {
        let params = DesignParameters {
            free: FreeValues::SallenKey { c1: 0.0, r3: 1000.0 },
            targets: Targets::default(),
        };
        assert!(matches!(
            compute(&params),
            Err(WizardError::InvalidParameter { name: "c1", .. })
        ));
    }

    #[test]
    fn test_boctor_defaults_return_signed_r1() {
        let params = DesignParameters {
            free: FreeValues::defaults(Topology::BoctorNotchLowpass),
            targets: Targets::default(),
        };
        let set = compute(&params).unwrap();
        assert_eq!(set, boctor_notch(100.0, 100.0, 1.0, 100.0, 2.0));

        let r4 = value(&set, "r4");
        assert_rel(r4, 795774.7, "r4");
        let r1 = value(&set, "r1");
        assert!(r1 < 0.0, "r1 = {r1}");
        assert_rel(r1, -0.49372, "r1");
        assert_eq!(r1, boctor_r1(100.0, r4));
        assert!(value(&set, "r3") < 0.0);
    }

    #[test]
    fn test_overflowing_derived_value_rejected() {
        // R3 scales with R5, so a huge R5 overflows it
        let params = DesignParameters {
            free: FreeValues::BoctorNotch { r6: 1000.0, r5: 1e308, c1: 10.0 },
            targets: Targets { gain: 100.0, freq_exp: 3.0 },
        };
        let err = compute(&params).unwrap_err();
        assert!(
            matches!(&err, WizardError::InvalidParameter { name: "targets", reason } if reason.contains("r3")),
            "unexpected error {err}"
        );
    }

    #[test]
    fn test_parameters_from_flat_json() {
        let params: DesignParameters = serde_json::from_str(
            r#"{"topology": "boctor_notch_lowpass", "r6": 1000, "r5": 2200, "c1": 4.7, "gain": 20, "freq_exp": 3}"#,
        )
        .unwrap();
        assert_eq!(params.topology(), Topology::BoctorNotchLowpass);
        assert_eq!(params.targets.gain, 20.0);
        assert_eq!(params.free, FreeValues::BoctorNotch { r6: 1000.0, r5: 2200.0, c1: 4.7 });
    }

    #[test]
    fn test_free_values_from_named_params() {
        let params = BTreeMap::from([("r3".to_string(), 2200.0)]);
        assert_eq!(
            FreeValues::from_params(Topology::SallenKeyLowpass, &params).unwrap(),
            FreeValues::SallenKey { c1: 1.0, r3: 2200.0 }
        );

        let params = BTreeMap::from([("c5".to_string(), 4.7)]);
        assert!(matches!(
            FreeValues::from_params(Topology::SallenKeyLowpass, &params),
            Err(WizardError::InvalidParameter { name: "params", .. })
        ));
    }

    #[test]
    fn test_display_helpers() {
        assert_rel(gain_db(100.0), 40.0, "gain_db");
        assert_rel(cutoff_hz(2.0), 100.0, "cutoff_hz");
    }
}
