//! Sistema de alertas – níveis e avaliação de thresholds.

use crate::config::AlertThresholds;
use crate::state::CabinetState;
use crate::types::SensorId;
use serde::{Deserialize, Serialize};

/// Nível de alerta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertLevel {
    Normal,
    Warning,
    Critical,
}

/// Um alerta disparado.
#[derive(Debug, Clone)]
pub struct Alert {
    pub sensor: SensorId,
    pub metric: String,
    pub label: String,
    pub value: f32,
    pub unit: String,
    pub level: AlertLevel,
}

/// Avalia as leituras do estado contra os thresholds e retorna alertas.
pub fn evaluate_alerts(state: &CabinetState, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for reading in state.readings.values() {
        let sensor = reading.sensor();
        check(
            &mut alerts,
            sensor,
            "temp",
            "Temp",
            reading.temperature(),
            "°C",
            thresholds.temp_warning,
            thresholds.temp_critical,
        );
        check(
            &mut alerts,
            sensor,
            "humidity",
            "Umidade",
            reading.humidity(),
            "%",
            thresholds.humidity_warning,
            thresholds.humidity_critical,
        );
    }

    alerts
}

#[allow(clippy::too_many_arguments)]
fn check(
    alerts: &mut Vec<Alert>,
    sensor: SensorId,
    metric: &str,
    label: &str,
    value: f32,
    unit: &str,
    warn: f32,
    crit: f32,
) {
    let level = level_for_value(value, warn, crit);
    if level == AlertLevel::Normal {
        return;
    }

    alerts.push(Alert {
        sensor,
        metric: format!("{sensor}_{metric}"),
        label: format!("{sensor} {label}"),
        value,
        unit: unit.into(),
        level,
    });
}

/// Retorna o [`AlertLevel`] para um valor dado thresholds.
pub fn level_for_value(value: f32, warn: f32, crit: f32) -> AlertLevel {
    if value >= crit {
        AlertLevel::Critical
    } else if value >= warn {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertThresholds;
    use crate::protocol::parse_frame;
    use crate::state::StateStore;

    fn state_with(frames: &[&str]) -> CabinetState {
        let mut store = StateStore::default();
        for frame in frames {
            store.apply_reading(parse_frame(frame).unwrap());
        }
        store.snapshot()
    }

    #[test]
    fn no_alerts_for_normal_values() {
        let state = state_with(&["sensor1:24.0,45.0", "sensor2:38.0,20.0"]);
        let alerts = evaluate_alerts(&state, &AlertThresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn critical_humidity_triggers_alert() {
        let state = state_with(&["sensor1:24.0,82.0"]);
        let alerts = evaluate_alerts(&state, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].metric, "sensor1_humidity");
        assert_eq!(alerts[0].sensor, SensorId::Sensor1);
    }

    #[test]
    fn overheating_dryer_warns() {
        let state = state_with(&["sensor2:52.0,15.0"]);
        let alerts = evaluate_alerts(&state, &AlertThresholds::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert_eq!(alerts[0].metric, "sensor2_temp");
    }

    #[test]
    fn warning_level() {
        assert_eq!(level_for_value(65.0, 60.0, 75.0), AlertLevel::Warning);
        assert_eq!(level_for_value(80.0, 60.0, 75.0), AlertLevel::Critical);
        assert_eq!(level_for_value(50.0, 60.0, 75.0), AlertLevel::Normal);
    }
}
