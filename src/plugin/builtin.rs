//! Built-in plugin instances.

use super::{Plugin, PluginTable};
use serde_json::Value as JsonValue;
use tracing::warn;

/// Instance name of [`TransactionIdPlugin`].
pub const TRANSACTION_ID_INSTANCE: &str = "GenerateTransactionIDPluginInstance";
/// Instance name of [`SimSwapPlugin`].
pub const SIM_SWAP_INSTANCE: &str = "SimSwapPluginInstance";
/// Instance name of [`TimestampPlugin`].
pub const TIMESTAMP_INSTANCE: &str = "CurrentTimestampPluginInstance";

/// Register every built-in instance. Instances still need a
/// `pluginConfigs` binding before templates can call them.
pub fn register_builtins(table: &mut PluginTable) {
    let results = [
        (
            TRANSACTION_ID_INSTANCE,
            table.register_instance(TRANSACTION_ID_INSTANCE, TransactionIdPlugin),
        ),
        (
            SIM_SWAP_INSTANCE,
            table.register_instance(SIM_SWAP_INSTANCE, SimSwapPlugin),
        ),
        (
            TIMESTAMP_INSTANCE,
            table.register_instance(TIMESTAMP_INSTANCE, TimestampPlugin),
        ),
    ];

    for (name, result) in results {
        if let Err(e) = result {
            warn!(instance = name, error = %e, "Skipping built-in plugin");
        }
    }
}

/// Generates a random transaction ID (UUID v4). Ignores its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionIdPlugin;

impl Plugin for TransactionIdPlugin {
    fn execute(&self, _args: &[JsonValue]) -> JsonValue {
        JsonValue::String(uuid::Uuid::new_v4().to_string())
    }
}

/// Current time as an RFC 3339 UTC timestamp. Ignores its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampPlugin;

impl Plugin for TimestampPlugin {
    fn execute(&self, _args: &[JsonValue]) -> JsonValue {
        JsonValue::String(chrono::Utc::now().to_rfc3339())
    }
}

/// SIM swap recency check.
///
/// Takes `(max_age_hours, score)` and returns whether the score matches the
/// age bucket: `< 24` -> 1, `24..=48` -> 2, `(48, 72]` -> 3, `> 72` -> 4.
/// Arguments may be numbers or numeric strings. Wrong arity or non-numeric
/// arguments return the string `"Error"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimSwapPlugin;

impl SimSwapPlugin {
    pub fn check(max_age: f64, score: f64) -> bool {
        if max_age < 24.0 {
            score == 1.0
        } else if max_age <= 48.0 {
            score == 2.0
        } else if max_age <= 72.0 {
            score == 3.0
        } else {
            score == 4.0
        }
    }
}

impl Plugin for SimSwapPlugin {
    fn execute(&self, args: &[JsonValue]) -> JsonValue {
        let [max_age, score] = args else {
            return JsonValue::String("Error".to_string());
        };
        match (as_number(max_age), as_number(score)) {
            (Some(max_age), Some(score)) => JsonValue::Bool(Self::check(max_age, score)),
            _ => JsonValue::String("Error".to_string()),
        }
    }
}

/// Finite numeric value of a number or numeric string. "NaN" and "inf"
/// parse as `f64` but are not numbers here.
fn as_number(value: &JsonValue) -> Option<f64> {
    let number = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginConfig;
    use crate::plugin::PluginRegistry;
    use serde_json::json;

    #[test]
    fn test_sim_swap_buckets() {
        let plugin = SimSwapPlugin;
        assert_eq!(plugin.execute(&[json!(10), json!(1)]), json!(true));
        assert_eq!(plugin.execute(&[json!(10), json!(2)]), json!(false));
        assert_eq!(plugin.execute(&[json!(24), json!(2)]), json!(true));
        assert_eq!(plugin.execute(&[json!(48), json!("2")]), json!(true));
        assert_eq!(plugin.execute(&[json!("60"), json!("3")]), json!(true));
        assert_eq!(plugin.execute(&[json!(100.5), json!(4)]), json!(true));
    }

    #[test]
    fn test_sim_swap_bad_input() {
        let plugin = SimSwapPlugin;
        assert_eq!(plugin.execute(&[json!(10)]), json!("Error"));
        assert_eq!(plugin.execute(&[json!("ten"), json!(1)]), json!("Error"));
        assert_eq!(plugin.execute(&[json!(null), json!(1)]), json!("Error"));
    }

    #[test]
    fn test_sim_swap_non_finite_input() {
        let plugin = SimSwapPlugin;
        for bad in ["NaN", "nan", "inf", "-inf", "infinity"] {
            assert_eq!(plugin.execute(&[json!(bad), json!("4")]), json!("Error"), "{bad}");
            assert_eq!(plugin.execute(&[json!(100), json!(bad)]), json!("Error"), "{bad}");
        }
    }

    #[test]
    fn test_transaction_id_is_uuid() {
        let first = TransactionIdPlugin.execute(&[]);
        let second = TransactionIdPlugin.execute(&[json!("ignored")]);
        let first = first.as_str().unwrap();
        assert!(uuid::Uuid::parse_str(first).is_ok());
        assert_ne!(Some(first), second.as_str());
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let value = TimestampPlugin.execute(&[]);
        assert!(chrono::DateTime::parse_from_rfc3339(value.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_builtins_need_binding() {
        let mut table = PluginTable::with_builtins();
        assert!(table.resolve("sim_swap").is_none());

        table
            .bind(&PluginConfig {
                name: "sim_swap".to_string(),
                path: "plugins/sim_swap_plugin.so".to_string(),
                instance_name: SIM_SWAP_INSTANCE.to_string(),
            })
            .unwrap();
        let plugin = table.resolve("sim_swap").unwrap();
        assert_eq!(plugin.execute(&[json!(30), json!(2)]), json!(true));
    }
}
