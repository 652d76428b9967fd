//! Markdown design report generation

use chrono::{DateTime, Utc};
use minijinja::{context, Environment};

use crate::equations::{ComponentValueSet, Targets};
use crate::error::Result;
use crate::measure::Measurement;
use crate::topology::Topology;

const REPORT_TEMPLATE: &str = r#"# {{ design_name }} Design

Generated {{ timestamp }}

Schematic: <{{ schematic_url }}>

## Targets

| Parameter | Value |
|-----------|-------|
| DC gain | {{ gain }} ({{ gain_db }} dB) |
| Cutoff frequency | {{ cutoff }} |

## Equations

{{ equations }}

## Component Values

| Component | Property | Value |
|-----------|----------|-------|
{% for c in components -%}
| {{ c.name }} | {{ c.property }} | {{ c.value }} |
{% endfor %}
{%- if measurement %}
## Simulation

| Measurement | Value |
|-------------|-------|
| DC gain | {{ measurement.gain_db }} dB |
| -3 dB cutoff | {{ measurement.cutoff }} |
{% endif %}"#;

/// Format a value with an SI prefix, e.g. `4.7nF`, `1.52kΩ`
pub fn format_si(value: f64, unit: &str) -> String {
    const PREFIXES: [(f64, &str); 8] = [
        (1e9, "G"),
        (1e6, "M"),
        (1e3, "k"),
        (1.0, ""),
        (1e-3, "m"),
        (1e-6, "u"),
        (1e-9, "n"),
        (1e-12, "p"),
    ];

    if value == 0.0 || !value.is_finite() {
        return format!("{}{}", value, unit);
    }
    let magnitude = value.abs();
    let (scale, prefix) = PREFIXES
        .iter()
        .copied()
        .find(|(scale, _)| magnitude >= *scale)
        .unwrap_or((1e-12, "p"));
    let scaled = value / scale;
    // Drop trailing zeros so 10.00k prints as 10k
    let text = format!("{:.3}", scaled);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}{}", text, prefix, unit)
}

/// Render a report stamped with the current time
pub fn render_report(
    topology: Topology,
    targets: &Targets,
    values: &ComponentValueSet,
    measurement: Option<&Measurement>,
) -> Result<String> {
    render_report_at(topology, targets, values, measurement, Utc::now())
}

pub fn render_report_at(
    topology: Topology,
    targets: &Targets,
    values: &ComponentValueSet,
    measurement: Option<&Measurement>,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE)?;
    let template = env.get_template("report")?;

    let components: Vec<_> = values
        .iter()
        .map(|v| {
            serde_json::json!({
                "name": v.component.to_uppercase(),
                "property": v.property.as_str(),
                "value": format_si(v.value, v.property.unit()),
            })
        })
        .collect();

    let measurement = measurement.map(|m| {
        serde_json::json!({
            "gain_db": format!("{:.2}", m.dc_gain_db),
            "cutoff": format_si(m.cutoff_hz, "Hz"),
        })
    });

    let output = template.render(context! {
        design_name => topology.design_name(),
        timestamp => timestamp.to_rfc3339(),
        schematic_url => topology.schematic_url(),
        gain => format!("{}", targets.gain),
        gain_db => format!("{:.2}", targets.gain_db()),
        cutoff => format_si(targets.cutoff_hz(), "Hz"),
        equations => topology.equations_markdown(),
        components => components,
        measurement => measurement,
    })?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equations::{compute, DesignParameters, FreeValues};
    use chrono::TimeZone;

    #[test]
    fn test_format_si() {
        assert_eq!(format_si(4.7e-9, "F"), "4.7nF");
        assert_eq!(format_si(1520.0, "Ω"), "1.52kΩ");
        assert_eq!(format_si(10_000.0, "Hz"), "10kHz");
        assert_eq!(format_si(100.0, "Hz"), "100Hz");
        assert_eq!(format_si(3.1831e-7, "F"), "318.31nF");
        assert_eq!(format_si(0.0, "F"), "0F");
    }

    #[test]
    fn test_report_lists_every_component() {
        let params = DesignParameters {
            free: FreeValues::SallenKey { c1: 10.0, r3: 1000.0 },
            targets: Targets { gain: 100.0, freq_exp: 3.0 },
        };
        let values = compute(&params).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let report = render_report_at(Topology::SallenKeyLowpass, &params.targets, &values, None, at).unwrap();

        assert!(report.starts_with("# Sallen-Key Lowpass Design"));
        assert!(report.contains("2024-05-01T12:00:00+00:00"));
        assert!(report.contains("| DC gain | 100 (40.00 dB) |"));
        assert!(report.contains("| Cutoff frequency | 1kHz |"));
        for name in ["C1", "R3", "C2", "R1", "R2", "R4"] {
            assert!(report.contains(&format!("| {} |", name)), "missing {name}");
        }
        assert!(!report.contains("## Simulation"));
    }

    #[test]
    fn test_report_includes_measurement() {
        let targets = Targets { gain: 10.0, freq_exp: 2.0 };
        let values = compute(&DesignParameters {
            free: FreeValues::MultipleFeedback { c5: 4.7 },
            targets,
        })
        .unwrap();
        let measurement = Measurement {
            dc_gain_db: 19.98,
            cutoff_hz: 102.3,
        };
        let report = render_report(Topology::MultipleFeedbackLowpass, &targets, &values, Some(&measurement)).unwrap();

        assert!(report.contains("## Simulation"));
        assert!(report.contains("| DC gain | 19.98 dB |"));
        assert!(report.contains("| -3 dB cutoff | 102.3Hz |"));
    }
}
