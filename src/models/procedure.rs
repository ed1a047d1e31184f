use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// One KPI declared by a procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiDefinition {
    pub nombre: String,
    pub meta: Option<f64>,
    pub tipo: Option<String>,
}

/// KPI definitions of a procedure, normalized from either stored shape:
/// `{"calls": {"meta": 10, "tipo": "resultado"}}` or
/// `[{"nombre": "calls", "meta": 10, "tipo": "resultado"}]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiSchema {
    definitions: Vec<KpiDefinition>,
}

/// Counts produced by evaluating a KPI submission against a schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiEvaluation {
    pub total: u32,
    pub met: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct KpiSummary {
    pub total_kpis: u32,
    pub kpis_met: u32,
    /// Ratio rendered as a percentage with two decimals, e.g. `"66.67%"`
    #[schema(example = "100.00%")]
    pub compliance_rate: String,
}

impl KpiEvaluation {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.met) / f64::from(self.total)
        }
    }

    pub fn summary(&self) -> KpiSummary {
        KpiSummary {
            total_kpis: self.total,
            kpis_met: self.met,
            compliance_rate: format!("{:.2}%", self.ratio() * 100.0),
        }
    }
}

impl KpiSchema {
    pub fn new(definitions: Vec<KpiDefinition>) -> Self {
        let mut schema = Self::default();
        for def in definitions {
            schema.upsert(def);
        }
        schema
    }

    /// Builds a schema from the raw `kpis` column of a procedure. Anything that
    /// is neither an array nor an object yields an empty schema.
    pub fn from_json(raw: Option<&Value>) -> Self {
        let mut schema = Self::default();
        match raw {
            Some(Value::Array(items)) => {
                for item in items {
                    let Some(nombre) = item.get("nombre").and_then(Value::as_str) else {
                        continue;
                    };
                    schema.upsert(KpiDefinition {
                        nombre: nombre.to_string(),
                        meta: item.get("meta").and_then(as_number),
                        tipo: item.get("tipo").and_then(Value::as_str).map(str::to_string),
                    });
                }
            }
            Some(Value::Object(map)) => {
                for (nombre, def) in map {
                    schema.upsert(KpiDefinition {
                        nombre: nombre.clone(),
                        meta: def.get("meta").and_then(as_number),
                        tipo: def.get("tipo").and_then(Value::as_str).map(str::to_string),
                    });
                }
            }
            _ => {}
        }
        schema
    }

    fn upsert(&mut self, def: KpiDefinition) {
        match self.definitions.iter_mut().find(|d| d.nombre == def.nombre) {
            Some(existing) => *existing = def,
            None => self.definitions.push(def),
        }
    }

    pub fn definitions(&self) -> &[KpiDefinition] {
        &self.definitions
    }

    pub fn get(&self, nombre: &str) -> Option<&KpiDefinition> {
        self.definitions.iter().find(|d| d.nombre == nombre)
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.nombre.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Declared KPI names absent from the submission, in declaration order.
    pub fn missing_from(&self, submitted: &Map<String, Value>) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|d| !submitted.contains_key(&d.nombre))
            .map(|d| d.nombre.clone())
            .collect()
    }

    /// Counts submitted KPIs that have a target, and how many reach it.
    /// Undeclared submissions are stored but never counted.
    pub fn evaluate(&self, submitted: &Map<String, Value>) -> KpiEvaluation {
        let mut evaluation = KpiEvaluation { total: 0, met: 0 };
        for (nombre, measurement) in submitted {
            let Some(meta) = self.get(nombre).and_then(|d| d.meta) else {
                continue;
            };
            evaluation.total += 1;
            if measured_value(measurement).is_some_and(|valor| valor >= meta) {
                evaluation.met += 1;
            }
        }
        evaluation
    }
}

/// Reads the `valor` of a submitted measurement.
pub fn measured_value(measurement: &Value) -> Option<f64> {
    measurement.get("valor").and_then(as_number)
}

/// Numbers, or strings holding a number.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
