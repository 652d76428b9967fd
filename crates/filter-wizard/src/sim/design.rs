//! Design revision records as exchanged with the simulation backend
//!
//! Only the component list is interpreted. Every other field is carried
//! through untouched so a written revision keeps whatever the backend sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::equations::{ComponentValue, ComponentValueSet};
use crate::error::{Result, WizardError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    #[serde(default)]
    pub comps: Vec<ComponentInstance>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    #[serde(rename = "instName")]
    pub name: String,
    #[serde(rename = "instProps", default)]
    pub props: Vec<InstanceProperty>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceProperty {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DesignRecord {
    pub fn component_names(&self) -> Vec<&str> {
        self.comps.iter().map(|c| c.name.as_str()).collect()
    }

    /// Set a property on every instance with the given name.
    ///
    /// Fails without modifying anything if no instance carries the property.
    pub fn set_property(&mut self, component: &str, property: &str, value: f64) -> Result<()> {
        let mut matched = 0;
        for prop in self
            .comps
            .iter_mut()
            .filter(|c| c.name == component)
            .flat_map(|c| c.props.iter_mut())
            .filter(|p| p.name == property)
        {
            prop.value = Value::from(value);
            matched += 1;
        }

        if matched == 0 {
            return Err(WizardError::ComponentPropertyNotFound {
                component: component.to_string(),
                property: property.to_string(),
            });
        }
        tracing::debug!("{} {} set to {}", component, property, value);
        Ok(())
    }

    pub fn property_value(&self, component: &str, property: &str) -> Option<f64> {
        self.comps
            .iter()
            .filter(|c| c.name == component)
            .flat_map(|c| c.props.iter())
            .find(|p| p.name == property)
            .and_then(|p| crate::json_f64(&p.value))
    }

    /// Apply every entry in order. All names are checked before any write,
    /// so a mismatch leaves the record unchanged.
    pub fn apply(&mut self, values: &ComponentValueSet) -> Result<()> {
        for v in values {
            let present = self
                .comps
                .iter()
                .filter(|c| c.name == v.component)
                .any(|c| c.props.iter().any(|p| p.name == v.property.as_str()));
            if !present {
                return Err(WizardError::ComponentPropertyNotFound {
                    component: v.component.clone(),
                    property: v.property.as_str().to_string(),
                });
            }
        }
        for v in values {
            self.set_property(&v.component, v.property.as_str(), v.value)?;
        }
        Ok(())
    }

    /// Re-read the (component, property) pairs of `values` from this record
    pub fn read_back(&self, values: &ComponentValueSet) -> Result<ComponentValueSet> {
        values
            .iter()
            .map(|v| {
                self.property_value(&v.component, v.property.as_str())
                    .map(|value| ComponentValue {
                        component: v.component.clone(),
                        property: v.property,
                        value,
                    })
                    .ok_or_else(|| WizardError::ComponentPropertyNotFound {
                        component: v.component.clone(),
                        property: v.property.as_str().to_string(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equations::{sallen_key, PropertyKind};
    use pretty_assertions::assert_eq;

    fn sallen_key_record() -> DesignRecord {
        let comps: Vec<Value> = [
            ("c1", "capacitance_value"),
            ("c2", "capacitance_value"),
            ("r1", "resistance_value"),
            ("r2", "resistance_value"),
            ("r3", "resistance_value"),
            ("r4", "resistance_value"),
        ]
        .iter()
        .map(|(name, prop)| {
            serde_json::json!({
                "instName": name,
                "model": "generic",
                "instProps": [
                    {"name": prop, "value": "1k", "unit": "SI"},
                    {"name": "tolerance", "value": 0.05}
                ]
            })
        })
        .collect();
        serde_json::from_value(serde_json::json!({
            "designID": "d1",
            "revisionID": "r2",
            "comps": comps,
            "simulationData": {"simulations": []}
        }))
        .unwrap()
    }

    #[test]
    fn test_apply_then_read_back_round_trips() {
        let mut record = sallen_key_record();
        let values = sallen_key(10.0, 1000.0, 100.0, 2.0);

        record.apply(&values).unwrap();
        let read = record.read_back(&values).unwrap();

        let mut expected: Vec<_> = values.iter().map(|v| (v.component.clone(), v.property, v.value)).collect();
        let mut actual: Vec<_> = read.iter().map(|v| (v.component.clone(), v.property, v.value)).collect();
        expected.sort_by(|a, b| a.0.cmp(&b.0));
        actual.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_unknown_property_leaves_record_untouched() {
        let mut record = sallen_key_record();
        let before = record.clone();
        let values: ComponentValueSet = [
            ComponentValue::resistance("r1", 4700.0),
            ComponentValue::capacitance("r2", 1e-9),
        ]
        .into_iter()
        .collect();

        let err = record.apply(&values).unwrap_err();
        assert!(matches!(
            err,
            WizardError::ComponentPropertyNotFound { ref component, ref property }
                if component == "r2" && property == "capacitance_value"
        ));
        assert_eq!(record, before);
    }

    #[test]
    fn test_unknown_component_is_reported() {
        let mut record = sallen_key_record();
        let err = record.set_property("r9", PropertyKind::Resistance.as_str(), 1.0).unwrap_err();
        assert!(matches!(err, WizardError::ComponentPropertyNotFound { .. }));
    }

    #[test]
    fn test_unrelated_fields_survive_serialization() {
        let mut record = sallen_key_record();
        record.set_property("r1", "resistance_value", 3300.0).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["designID"], "d1");
        assert_eq!(json["simulationData"], serde_json::json!({"simulations": []}));
        let r1 = json["comps"].as_array().unwrap().iter().find(|c| c["instName"] == "r1").unwrap();
        assert_eq!(r1["model"], "generic");
        assert_eq!(r1["instProps"][0]["value"], 3300.0);
        assert_eq!(r1["instProps"][0]["unit"], "SI");
        assert_eq!(r1["instProps"][1]["value"], 0.05);
    }
}
