//! Estado do armário: leituras mais recentes, contagem regressiva e status
//! da secagem.
//!
//! O [`StateStore`] pertence exclusivamente ao loop de polling. Os demais
//! componentes recebem cópias ([`CabinetState`]) via eventos.

use crate::types::{DryingStatus, SensorId, SensorReading};
use crate::vision::ShoeType;
use std::collections::BTreeMap;

/// Duração padrão do ciclo de secagem (segundos).
pub const DEFAULT_DRYING_SECS: u32 = 999;

/// Erros de comandos sobre o estado.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Secagem só pode iniciar a partir de Aguardando (status atual: {0})")]
    NotIdle(DryingStatus),
}

/// Snapshot do estado do armário.
#[derive(Debug, Clone, PartialEq)]
pub struct CabinetState {
    pub readings: BTreeMap<SensorId, SensorReading>,
    pub remaining_seconds: u32,
    pub status: DryingStatus,
    pub shoe_type: Option<ShoeType>,
}

impl CabinetState {
    fn with_duration(remaining_seconds: u32) -> Self {
        Self {
            readings: BTreeMap::new(),
            remaining_seconds,
            status: DryingStatus::Idle,
            shoe_type: None,
        }
    }

    pub fn reading(&self, sensor: SensorId) -> Option<&SensorReading> {
        self.readings.get(&sensor)
    }
}

impl Default for CabinetState {
    fn default() -> Self {
        Self::with_duration(DEFAULT_DRYING_SECS)
    }
}

/// Campos alterados por [`StateStore::apply_reading`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldChanges {
    /// Primeira leitura deste sensor.
    pub new_sensor: bool,
    pub temperature: bool,
    pub humidity: bool,
}

impl FieldChanges {
    pub fn any(&self) -> bool {
        self.new_sensor || self.temperature || self.humidity
    }
}

/// Dono do [`CabinetState`] mutável.
#[derive(Debug)]
pub struct StateStore {
    state: CabinetState,
    default_seconds: u32,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_DRYING_SECS)
    }
}

impl StateStore {
    /// Cria o store com a duração padrão de secagem usada por [`reset`](Self::reset).
    pub fn new(default_seconds: u32) -> Self {
        Self {
            state: CabinetState::with_duration(default_seconds),
            default_seconds,
        }
    }

    pub fn state(&self) -> &CabinetState {
        &self.state
    }

    /// Cópia do estado atual.
    pub fn snapshot(&self) -> CabinetState {
        self.state.clone()
    }

    pub fn status(&self) -> DryingStatus {
        self.state.status
    }

    /// Substitui a leitura do sensor e informa o que mudou.
    pub fn apply_reading(&mut self, reading: SensorReading) -> FieldChanges {
        let changes = match self.state.readings.get(&reading.sensor()) {
            Some(prev) => FieldChanges {
                new_sensor: false,
                temperature: prev.temperature() != reading.temperature(),
                humidity: prev.humidity() != reading.humidity(),
            },
            None => FieldChanges {
                new_sensor: true,
                temperature: true,
                humidity: true,
            },
        };
        self.state.readings.insert(reading.sensor(), reading);
        changes
    }

    /// Avança a contagem em um segundo.
    ///
    /// Só tem efeito com status `Active`. Ao chegar em zero o status passa
    /// para `Complete` uma única vez; a contagem nunca fica negativa.
    pub fn tick(&mut self) -> (u32, DryingStatus) {
        if self.state.status == DryingStatus::Active {
            self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
            if self.state.remaining_seconds == 0 {
                self.state.status = DryingStatus::Complete;
            }
        }
        (self.state.remaining_seconds, self.state.status)
    }

    /// Volta ao estado padrão (leituras, contagem, status e tipo de sapato).
    pub fn reset(&mut self) -> CabinetState {
        self.state = CabinetState::with_duration(self.default_seconds);
        self.snapshot()
    }

    /// Inicia a secagem (`Idle` → `Active`).
    ///
    /// `seconds = None` mantém a contagem atual.
    pub fn start_drying(&mut self, seconds: Option<u32>) -> Result<(), StateError> {
        if self.state.status != DryingStatus::Idle {
            return Err(StateError::NotIdle(self.state.status));
        }
        if let Some(secs) = seconds {
            self.state.remaining_seconds = secs;
        }
        self.state.status = DryingStatus::Active;
        Ok(())
    }

    pub fn set_shoe_type(&mut self, shoe_type: Option<ShoeType>) {
        self.state.shoe_type = shoe_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_frame;

    fn active_store(seconds: u32) -> StateStore {
        let mut store = StateStore::new(seconds);
        store.start_drying(None).unwrap();
        store
    }

    #[test]
    fn tick_completes_exactly_once() {
        let n = 5;
        let mut store = active_store(n);
        let mut completions = 0;
        let mut prev = store.status();
        for _ in 0..n {
            let (_, status) = store.tick();
            if status == DryingStatus::Complete && prev != DryingStatus::Complete {
                completions += 1;
            }
            prev = status;
        }
        assert_eq!(completions, 1);
        assert_eq!(store.state().remaining_seconds, 0);

        // Ticks extras não decrementam nem repetem a transição
        assert_eq!(store.tick(), (0, DryingStatus::Complete));
        assert_eq!(store.tick(), (0, DryingStatus::Complete));
    }

    #[test]
    fn tick_is_noop_unless_active() {
        let mut store = StateStore::new(10);
        assert_eq!(store.tick(), (10, DryingStatus::Idle));
        assert_eq!(store.state().remaining_seconds, 10);
    }

    #[test]
    fn zero_duration_completes_on_first_tick() {
        let mut store = StateStore::new(10);
        store.start_drying(Some(0)).unwrap();
        assert_eq!(store.tick(), (0, DryingStatus::Complete));
    }

    #[test]
    fn complete_cannot_restart_without_reset() {
        let mut store = active_store(1);
        store.tick();
        assert_eq!(
            store.start_drying(None),
            Err(StateError::NotIdle(DryingStatus::Complete))
        );
        store.reset();
        assert!(store.start_drying(None).is_ok());
    }

    #[test]
    fn readings_from_two_sensors_coexist() {
        let mut store = StateStore::default();
        store.apply_reading(parse_frame("sensor1:22.5,41.0").unwrap());
        store.apply_reading(parse_frame("sensor2:35.0,20.0").unwrap());

        let s1 = store.state().reading(SensorId::Sensor1).unwrap();
        let s2 = store.state().reading(SensorId::Sensor2).unwrap();
        assert_eq!((s1.temperature(), s1.humidity()), (22.5, 41.0));
        assert_eq!((s2.temperature(), s2.humidity()), (35.0, 20.0));
        assert!(store.state().reading(SensorId::Sensor3).is_none());
    }

    #[test]
    fn apply_reading_reports_changed_fields() {
        let mut store = StateStore::default();
        let first = store.apply_reading(parse_frame("sensor1:22.5,41.0").unwrap());
        assert!(first.new_sensor);

        let second = store.apply_reading(parse_frame("sensor1:22.5,45.0").unwrap());
        assert_eq!(
            second,
            FieldChanges {
                new_sensor: false,
                temperature: false,
                humidity: true,
            }
        );

        let same = store.apply_reading(parse_frame("sensor1:22.5,45.0").unwrap());
        assert!(!same.any());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut store = active_store(30);
        store.apply_reading(parse_frame("sensor1:22.5,41.0").unwrap());
        store.set_shoe_type(Some(ShoeType::Sneakers));
        store.tick();

        let state = store.reset();
        assert_eq!(state.remaining_seconds, 30);
        assert_eq!(state.status, DryingStatus::Idle);
        assert!(state.readings.is_empty());
        assert_eq!(state.shoe_type, None);
    }

    #[test]
    fn default_store_uses_documented_duration() {
        let mut store = StateStore::default();
        assert_eq!(store.reset().remaining_seconds, DEFAULT_DRYING_SECS);
    }
}
