use serde_json::{Map, Value, json};

/// Site configuration shared by the shell, the interpreter and the capability helpers.
///
/// Stored as a JSON object so host pages can pass partial overrides straight through; getters
/// take dotted paths (`"shell.showTrace"`).
#[derive(Debug, Clone, PartialEq)]
pub struct LumenConfig(Value);

impl Default for LumenConfig {
    fn default() -> Self {
        Self(json!({
            "shell": { "showTrace": true },
            "script": { "maxCallDepth": 256, "maxLoopIterations": 1000000 },
            "canvas": { "scrollAdapter": true },
            "highlight": { "theme": "dark" },
            "chart": { "width": 600, "height": 300 },
            "plot": { "width": 640, "height": 400 }
        }))
    }
}

impl LumenConfig {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Site defaults with `overrides` merged on top.
    pub fn with_overrides(overrides: &Value) -> Self {
        let mut cfg = Self::default();
        cfg.deep_merge(overrides);
        cfg
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get(dotted_path)?.as_str()
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.get(dotted_path)?.as_bool()
    }

    pub fn get_f64(&self, dotted_path: &str) -> Option<f64> {
        self.get(dotted_path)?.as_f64()
    }

    pub fn get_usize(&self, dotted_path: &str) -> Option<usize> {
        let v = self.get(dotted_path)?;
        v.as_u64()
            .map(|n| n as usize)
            .or_else(|| v.as_f64().filter(|n| *n >= 0.0).map(|n| n as usize))
    }

    pub fn show_trace(&self) -> bool {
        self.get_bool("shell.showTrace").unwrap_or(true)
    }

    pub fn max_call_depth(&self) -> usize {
        self.get_usize("script.maxCallDepth").unwrap_or(256)
    }

    pub fn max_loop_iterations(&self) -> usize {
        self.get_usize("script.maxLoopIterations").unwrap_or(1_000_000)
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        // Configs are objects; a non-object root (from `from_value`) is coerced so this never
        // panics on host input.
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    pub fn deep_merge(&mut self, other: &Value) {
        deep_merge_value(&mut self.0, other);
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_merge_onto_defaults() {
        let cfg = LumenConfig::with_overrides(&json!({
            "shell": { "showTrace": false },
            "chart": { "width": 800 }
        }));
        assert!(!cfg.show_trace());
        assert_eq!(cfg.get_f64("chart.width"), Some(800.0));
        assert_eq!(cfg.get_f64("chart.height"), Some(300.0));
        assert_eq!(cfg.max_call_depth(), 256);
        assert_eq!(cfg.max_loop_iterations(), 1_000_000);
    }

    #[test]
    fn set_value_coerces_non_object_root() {
        let mut cfg = LumenConfig::from_value(json!(42));
        cfg.set_value("script.maxCallDepth", json!(8));
        assert_eq!(cfg.max_call_depth(), 8);
    }
}
