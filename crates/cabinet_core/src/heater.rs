//! Controle liga/desliga do aquecedor da câmara de secagem.
//!
//! Acima do alvo com o aquecedor ligado: desliga e espera `recheck` antes de
//! religar. Enquanto a temperatura continuar acima do alvo a espera é
//! renovada. Abaixo do alvo, fora da espera e desligado: liga.

use crate::protocol::DeviceCommand;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug)]
pub struct HeaterControl {
    pin: u8,
    target: Option<f32>,
    recheck: Duration,
    on: bool,
    hold_until: Option<Instant>,
}

impl HeaterControl {
    pub fn new(pin: u8, target: Option<f32>, recheck: Duration) -> Self {
        Self {
            pin,
            target,
            recheck,
            on: false,
            hold_until: None,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn target(&self) -> Option<f32> {
        self.target
    }

    pub fn set_target(&mut self, target: Option<f32>) {
        self.target = target;
    }

    /// Avalia a temperatura da câmara e devolve o comando a enviar, se houver.
    pub fn evaluate(&mut self, temperature: f32, now: Instant) -> Option<DeviceCommand> {
        let target = self.target?;

        if let Some(until) = self.hold_until {
            if now < until {
                return None;
            }
            if temperature > target {
                info!("Temperatura ainda alta ({temperature:.1}°C > {target:.1}°C), aguardando");
                self.hold_until = Some(now + self.recheck);
                return None;
            }
            self.hold_until = None;
        }

        if temperature > target && self.on {
            info!("Temperatura alta ({temperature:.1}°C), desligando aquecedor");
            self.on = false;
            self.hold_until = Some(now + self.recheck);
            Some(DeviceCommand::PinsOff(vec![self.pin]))
        } else if temperature < target && !self.on {
            info!("Temperatura baixa ({temperature:.1}°C), ligando aquecedor");
            self.on = true;
            Some(DeviceCommand::PinOn(self.pin))
        } else {
            None
        }
    }

    /// Desfaz o efeito de `evaluate` quando o comando não chegou ao Arduino,
    /// para que o próximo ciclo tente de novo.
    pub fn rollback(&mut self, command: &DeviceCommand) {
        match command {
            DeviceCommand::PinOn(pin) if *pin == self.pin => self.on = false,
            DeviceCommand::PinsOff(pins) if pins.contains(&self.pin) => {
                self.on = true;
                self.hold_until = None;
            }
            _ => {}
        }
    }

    /// Desliga o aquecedor (fim ou cancelamento da secagem).
    pub fn force_off(&mut self) -> Option<DeviceCommand> {
        self.hold_until = None;
        if std::mem::take(&mut self.on) {
            Some(DeviceCommand::PinsOff(vec![self.pin]))
        } else {
            None
        }
    }
}
