//! Supported lowpass filter topologies and their fixed metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WizardError;

/// A fixed filter circuit template held as a design on the simulation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    SallenKeyLowpass,
    BoctorNotchLowpass,
    MultipleFeedbackLowpass,
}

/// Slider description for one user-chosen component value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreeParameter {
    pub name: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

const CAPACITOR_SLIDER: (f64, f64, f64) = (1.0, 50.0, 0.1);
const RESISTOR_SLIDER: (f64, f64, f64) = (100.0, 10000.0, 1.0);

const fn capacitor(name: &'static str) -> FreeParameter {
    FreeParameter {
        name,
        unit: "nF",
        min: CAPACITOR_SLIDER.0,
        max: CAPACITOR_SLIDER.1,
        step: CAPACITOR_SLIDER.2,
    }
}

const fn resistor(name: &'static str) -> FreeParameter {
    FreeParameter {
        name,
        unit: "Ohm",
        min: RESISTOR_SLIDER.0,
        max: RESISTOR_SLIDER.1,
        step: RESISTOR_SLIDER.2,
    }
}

const SALLEN_KEY_PARAMS: [FreeParameter; 2] = [capacitor("c1"), resistor("r3")];
const BOCTOR_PARAMS: [FreeParameter; 3] = [resistor("r6"), resistor("r5"), capacitor("c1")];
const MULTIPLE_FEEDBACK_PARAMS: [FreeParameter; 1] = [capacitor("c5")];

const EQUATIONS_REFERENCE: &str =
    "http://www.analog.com/media/en/training-seminars/design-handbooks/Basic-Linear-Design/Chapter8.pdf";

const SALLEN_KEY_EQUATIONS: &str = "\
### Choose C1, R3
### Then:
k = Freq * C1

m = (Gain-1) / 4

C2 = m * C1

R1 = 2 / k

R2 = 1 / (2 * m * k)

R4 = R3 / (Gain-1)
";

const BOCTOR_EQUATIONS: &str = "\
### Choose R6, R5, C1
### Then:
R4 = 1 / (2 * Freq * C1)

R2 = (R4 * R6) / (R4 = R6)

R1 = 1/2 * [(R6/R4)-1]

R3 = R5 * [(R6/R1) + 2*(C1/C2)]

C2 = (4 * R4 * C1) / R6
";

const MULTIPLE_FEEDBACK_EQUATIONS: &str = "\
### Choose C5
### Then:
k = Freq * C5

C2 = 4 * (Gain+1) * C5

R1 = 1 / (2 * Gain * k)

R3 = 1 / [2 * (Gain + 1) * k]

R4 = 1 / (2 * k)
";

impl Topology {
    pub const ALL: [Topology; 3] = [
        Topology::SallenKeyLowpass,
        Topology::BoctorNotchLowpass,
        Topology::MultipleFeedbackLowpass,
    ];

    /// Name of the design record on the simulation backend
    pub fn design_name(&self) -> &'static str {
        match self {
            Topology::SallenKeyLowpass => "Sallen-Key Lowpass",
            Topology::BoctorNotchLowpass => "Boctor Notch Lowpass",
            Topology::MultipleFeedbackLowpass => "Multiple Feedback Lowpass",
        }
    }

    /// Waveform holding gain in dB versus frequency
    pub fn gain_waveform(&self) -> &'static str {
        match self {
            Topology::BoctorNotchLowpass => "u1/output/dbMag",
            Topology::SallenKeyLowpass | Topology::MultipleFeedbackLowpass => "u1/vout/dbMag",
        }
    }

    /// Waveform holding phase in degrees versus frequency
    pub fn phase_waveform(&self) -> &'static str {
        "u1/vout/phase"
    }

    pub fn schematic_url(&self) -> &'static str {
        match self {
            Topology::SallenKeyLowpass => "https://systemvision.com/node/232411",
            Topology::BoctorNotchLowpass => "https://systemvision.com/node/232406",
            Topology::MultipleFeedbackLowpass => "https://systemvision.com/node/232416",
        }
    }

    pub fn free_parameters(&self) -> &'static [FreeParameter] {
        match self {
            Topology::SallenKeyLowpass => &SALLEN_KEY_PARAMS,
            Topology::BoctorNotchLowpass => &BOCTOR_PARAMS,
            Topology::MultipleFeedbackLowpass => &MULTIPLE_FEEDBACK_PARAMS,
        }
    }

    /// Resistor whose value is sent to the parts catalog after an equation-driven design
    pub fn sourcing_component(&self) -> &'static str {
        match self {
            Topology::SallenKeyLowpass => "r3",
            Topology::BoctorNotchLowpass => "r6",
            Topology::MultipleFeedbackLowpass => "r1",
        }
    }

    /// Textbook design equations as displayed beside the schematic.
    ///
    /// This is display text only: the Boctor R1 relation shown here differs
    /// from the one [`crate::equations`] computes.
    pub fn equations_markdown(&self) -> String {
        let body = match self {
            Topology::SallenKeyLowpass => SALLEN_KEY_EQUATIONS,
            Topology::BoctorNotchLowpass => BOCTOR_EQUATIONS,
            Topology::MultipleFeedbackLowpass => MULTIPLE_FEEDBACK_EQUATIONS,
        };
        format!(
            "## {} Design Equations\nThese equations and more info can be found [HERE]({})\n{}",
            self.design_name(),
            EQUATIONS_REFERENCE,
            body
        )
    }

    pub fn from_design_name(name: &str) -> Option<Topology> {
        Topology::ALL.into_iter().find(|t| t.design_name() == name)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.design_name())
    }
}

impl FromStr for Topology {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(topology) = Topology::from_design_name(s) {
            return Ok(topology);
        }
        match s.to_lowercase().replace('_', "-").as_str() {
            "sallen-key" | "sallen-key-lowpass" | "sallen" => Ok(Topology::SallenKeyLowpass),
            "boctor" | "boctor-notch" | "boctor-notch-lowpass" => Ok(Topology::BoctorNotchLowpass),
            "mfb" | "multiple-feedback" | "multiple-feedback-lowpass" => {
                Ok(Topology::MultipleFeedbackLowpass)
            }
            _ => Err(WizardError::UnknownTopology(s.to_string())),
        }
    }
}
