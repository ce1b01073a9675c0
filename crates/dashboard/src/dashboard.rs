//! Dashboard principal – App eframe/egui.

use crate::panels;
use crate::theme_egui::{self, EguiTheme};
use cabinet_core::config::AppConfig;
use cabinet_core::history::CsvHistory;
use cabinet_core::poll::{CabinetEvent, LoopCommand, LoopState, PollHandle, PollLoop};
use cabinet_core::serial::SerialConnection;
use cabinet_core::state::{CabinetState, StateStore};
use cabinet_core::types::{DryingStatus, SensorId};
use cabinet_core::vision::{self, CommandCamera, CommandClassifier, Prediction};
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use egui::{Color32, RichText};
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const HISTORY_SIZE: usize = 300; // 5 minutos a 1 ciclo/s
const STALE_AFTER: Duration = Duration::from_secs(5);

type VisionResult = Result<(PathBuf, Prediction), String>;

/// Estado do dashboard.
pub struct CabinetDashboard {
    config: AppConfig,
    theme: EguiTheme,
    theme_index: usize,
    all_themes: Vec<EguiTheme>,

    // Loop de polling
    handle: Option<PollHandle>,
    events: Option<Receiver<CabinetEvent>>,
    link_error: Option<String>,

    // Dados
    state: CabinetState,
    heater_on: bool,
    last_reading: Option<Instant>,
    history: HistoryData,

    // Reconhecimento
    vision_rx: Option<Receiver<VisionResult>>,
    prediction: Option<Prediction>,
    runner_up_chosen: bool,
    vision_status: String,

    // UI state
    duration_input: String,
    raw_input: String,
    show_graphs: bool,
    is_fullscreen: bool,
}

/// Séries por sensor: (amostra, valor).
struct HistoryData {
    sample: u64,
    temperature: [VecDeque<[f64; 2]>; 3],
    humidity: [VecDeque<[f64; 2]>; 3],
}

impl HistoryData {
    fn new() -> Self {
        Self {
            sample: 0,
            temperature: std::array::from_fn(|_| VecDeque::with_capacity(HISTORY_SIZE)),
            humidity: std::array::from_fn(|_| VecDeque::with_capacity(HISTORY_SIZE)),
        }
    }

    fn push(&mut self, state: &CabinetState) {
        let x = self.sample as f64;
        self.sample += 1;
        for (i, sensor) in SensorId::ALL.iter().enumerate() {
            if let Some(r) = state.reading(*sensor) {
                Self::push_deque(&mut self.temperature[i], [x, r.temperature() as f64]);
                Self::push_deque(&mut self.humidity[i], [x, r.humidity() as f64]);
            }
        }
    }

    fn push_deque(deque: &mut VecDeque<[f64; 2]>, point: [f64; 2]) {
        if deque.len() >= HISTORY_SIZE {
            deque.pop_front();
        }
        deque.push_back(point);
    }
}

impl CabinetDashboard {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        // Carrega tema
        let all_themes = theme_egui::all_themes();
        let theme_index = all_themes
            .iter()
            .position(|t| t.name == config.ui.theme)
            .unwrap_or(0);
        let theme = all_themes[theme_index].clone();

        let mut dashboard = Self {
            state: StateStore::new(config.drying.duration_secs).snapshot(),
            duration_input: config.drying.duration_secs.to_string(),
            config,
            theme,
            theme_index,
            all_themes,
            handle: None,
            events: None,
            link_error: None,
            heater_on: false,
            last_reading: None,
            history: HistoryData::new(),
            vision_rx: None,
            prediction: None,
            runner_up_chosen: false,
            vision_status: String::new(),
            raw_input: String::new(),
            show_graphs: true,
            is_fullscreen: false,
        };
        dashboard.connect();
        dashboard
    }

    /// Abre a porta e inicia o loop de polling.
    fn connect(&mut self) {
        // O loop anterior precisa soltar a porta antes de reabri-la
        self.handle = None;
        self.events = None;

        let serial = &self.config.serial;
        let link = match SerialConnection::open(&serial.port, serial.baud_rate, serial.timeout()) {
            Ok(link) => link,
            Err(e) => {
                error!("{e}");
                self.link_error = Some(e.to_string());
                return;
            }
        };

        let store = StateStore::new(self.config.drying.duration_secs);
        let mut poll = PollLoop::new(Box::new(link), store, &self.config);
        if self.config.history.enabled {
            match CsvHistory::open(&self.config.history.path) {
                Ok(history) => poll = poll.with_sink(Box::new(history)),
                Err(e) => warn!("Histórico desativado: {e}"),
            }
        }

        let events = poll.subscribe();
        match poll.start() {
            Ok(handle) => {
                self.handle = Some(handle);
                self.events = Some(events);
                self.link_error = None;
            }
            Err(e) => {
                error!("{e}");
                self.link_error = Some(e.to_string());
            }
        }
    }

    fn send(&self, command: LoopCommand) {
        match &self.handle {
            Some(handle) if handle.send(command.clone()) => {}
            _ => warn!("Loop parado, comando ignorado: {command:?}"),
        }
    }

    fn loop_state(&self) -> Option<LoopState> {
        self.handle.as_ref().map(PollHandle::state)
    }

    fn is_running(&self) -> bool {
        self.loop_state() == Some(LoopState::Running)
    }

    /// Processa eventos pendentes do loop de polling.
    fn poll_events(&mut self) {
        let Some(rx) = &self.events else {
            return;
        };
        let mut stopped = false;
        loop {
            match rx.try_recv() {
                Ok(CabinetEvent::Reading(_)) => self.last_reading = Some(Instant::now()),
                Ok(CabinetEvent::Heater(on)) => self.heater_on = on,
                Ok(CabinetEvent::StatusChanged { to, .. }) => {
                    if to == DryingStatus::Complete {
                        info!("Secagem concluída");
                    }
                }
                Ok(CabinetEvent::Snapshot(state)) => {
                    self.history.push(&state);
                    self.state = state;
                }
                Ok(CabinetEvent::Stopped) | Err(TryRecvError::Disconnected) => {
                    stopped = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
        if stopped {
            self.events = None;
            self.heater_on = false;
        }
    }

    /// Resultado do reconhecimento em segundo plano.
    fn poll_vision(&mut self) {
        let Some(rx) = &self.vision_rx else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err("reconhecimento interrompido".into()),
        };
        self.vision_rx = None;

        match result {
            Ok((image, prediction)) => {
                let (shoe, p) = prediction.best();
                self.vision_status = format!("{} ({:.0}%) – {}", shoe.label(), p * 100.0, image.display());
                self.send(LoopCommand::SetShoeType(Some(shoe)));
                self.prediction = Some(prediction);
                self.runner_up_chosen = false;
            }
            Err(e) => {
                warn!("Reconhecimento falhou: {e}");
                self.vision_status = e;
            }
        }
    }

    /// Captura e classifica numa thread própria para não travar a UI.
    fn start_recognition(&mut self) {
        if self.vision_rx.is_some() {
            return;
        }
        let vision_cfg = &self.config.vision;
        let mut camera = CommandCamera::new(&vision_cfg.capture_command, &vision_cfg.image_path);
        let classifier = CommandClassifier::new(&vision_cfg.classify_command);
        let (tx, rx) = bounded::<VisionResult>(1);

        let spawned = std::thread::Builder::new()
            .name("shoe-vision".into())
            .spawn(move || {
                let result = vision::recognize(&mut camera, &classifier).map_err(|e| e.to_string());
                let _ = tx.send(result);
            });
        match spawned {
            Ok(_) => {
                self.vision_rx = Some(rx);
                self.vision_status = "Reconhecendo...".into();
            }
            Err(e) => self.vision_status = format!("Falha ao iniciar reconhecimento: {e}"),
        }
    }

    /// "Reconhecer de novo": troca para a segunda classe mais provável.
    fn choose_runner_up(&mut self) {
        let Some(prediction) = &self.prediction else {
            return;
        };
        let (shoe, p) = prediction.runner_up();
        self.vision_status = format!("{} ({:.0}%)", shoe.label(), p * 100.0);
        self.runner_up_chosen = true;
        self.send(LoopCommand::SetShoeType(Some(shoe)));
    }

    fn start_drying(&mut self) {
        let text = self.duration_input.trim();
        let seconds = if text.is_empty() {
            None
        } else {
            match text.parse::<u32>() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!("Duração inválida: {text:?}");
                    return;
                }
            }
        };
        self.send(LoopCommand::StartDrying { seconds });
    }

    fn reset(&mut self) {
        self.send(LoopCommand::Reset);
        self.prediction = None;
        self.runner_up_chosen = false;
        self.vision_status.clear();
    }

    // ── Render ──

    fn render_status(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui: &mut egui::Ui| {
            let (text, color) = if let Some(e) = &self.link_error {
                (format!("○ {e}"), self.theme.critical)
            } else if !self.is_running() {
                ("○ Loop de polling parado".to_string(), self.theme.critical)
            } else {
                match self.last_reading {
                    Some(t) if t.elapsed() < STALE_AFTER => (
                        format!(
                            "● {} | leitura há {}ms",
                            self.config.serial.port,
                            t.elapsed().as_millis()
                        ),
                        Color32::from_rgb(0, 255, 136),
                    ),
                    _ => (
                        format!("○ Aguardando dados em {}...", self.config.serial.port),
                        self.theme.warning,
                    ),
                }
            };
            ui.label(RichText::new(text).color(color).monospace());
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let running = self.is_running();
        let idle = self.state.status == DryingStatus::Idle;

        ui.horizontal_wrapped(|ui: &mut egui::Ui| {
            ui.label(RichText::new("Secagem (s):").color(self.theme.dim).monospace());
            ui.add(egui::TextEdit::singleline(&mut self.duration_input).desired_width(60.0));
            if ui.add_enabled(running && idle, egui::Button::new("▶ Secar")).clicked() {
                self.start_drying();
            }
            if ui.add_enabled(running, egui::Button::new("⟲ Reset")).clicked() {
                self.reset();
            }

            ui.separator();

            if ui.add_enabled(running, egui::Button::new("💧 Desumidificar")).clicked() {
                self.send(LoopCommand::StartDehumidify);
            }
            if ui.add_enabled(running, egui::Button::new("■ Parar")).clicked() {
                self.send(LoopCommand::StopDehumidify);
            }

            ui.separator();

            ui.label(RichText::new("Pino:").color(self.theme.dim).monospace());
            ui.add(egui::TextEdit::singleline(&mut self.raw_input).desired_width(60.0));
            if ui
                .add_enabled(running && !self.raw_input.trim().is_empty(), egui::Button::new("Enviar"))
                .clicked()
            {
                let raw = std::mem::take(&mut self.raw_input);
                self.send(LoopCommand::SendRaw(raw));
            }
        });

        ui.horizontal_wrapped(|ui: &mut egui::Ui| {
            let busy = self.vision_rx.is_some();
            if ui.add_enabled(!busy, egui::Button::new("📷 Reconhecer calçado")).clicked() {
                self.start_recognition();
            }
            let can_retry = self.prediction.is_some() && !self.runner_up_chosen && !busy;
            if ui.add_enabled(can_retry, egui::Button::new("↻ Reconhecer de novo")).clicked() {
                self.choose_runner_up();
            }
            if !self.vision_status.is_empty() {
                ui.label(RichText::new(&self.vision_status).color(self.theme.dim).monospace());
            }
        });
    }

    /// Renderiza os gráficos de histórico.
    fn render_graphs(&self, ui: &mut egui::Ui) {
        let width = ui.available_width() / 2.0 - 8.0;
        let height = 160.0;

        ui.horizontal(|ui: &mut egui::Ui| {
            ui.vertical(|ui: &mut egui::Ui| {
                self.history_plot(ui, "Temperatura °C", &self.history.temperature, width, height, 60.0);
            });
            ui.vertical(|ui: &mut egui::Ui| {
                self.history_plot(ui, "Umidade %", &self.history.humidity, width, height, 100.0);
            });
        });
    }

    fn history_plot(
        &self,
        ui: &mut egui::Ui,
        label: &str,
        series: &[VecDeque<[f64; 2]>; 3],
        width: f32,
        height: f32,
        y_max: f64,
    ) {
        ui.label(RichText::new(label).color(self.theme.title).monospace().size(11.0));

        Plot::new(format!("plot_{label}"))
            .height(height)
            .width(width)
            .legend(Legend::default())
            .show_axes([false, true])
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .allow_boxed_zoom(false)
            .include_y(0.0)
            .include_y(y_max)
            .show(ui, |plot_ui| {
                for (i, sensor) in SensorId::ALL.iter().enumerate() {
                    let chamber = self.config.chamber_of(*sensor);
                    let points: PlotPoints = series[i].iter().copied().collect();
                    plot_ui.line(
                        Line::new(points)
                            .name(format!("{} ({sensor})", panels::chamber_title(chamber)))
                            .color(self.theme.chamber_color(chamber))
                            .width(1.5),
                    );
                }
            });
    }
}

impl eframe::App for CabinetDashboard {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ── Eventos ──
        self.poll_events();
        self.poll_vision();

        ctx.request_repaint_after(Duration::from_millis(100));

        // ── Configurar estilo visual baseado no tema ──
        ctx.set_visuals(self.theme.visuals());

        // ── Atalhos de teclado ──
        // Ignorados enquanto um campo de texto tem foco
        if !ctx.wants_keyboard_input() {
            let (graphs, theme, quit, fullscreen) = ctx.input(|i: &egui::InputState| {
                (
                    i.key_pressed(egui::Key::G),
                    i.key_pressed(egui::Key::T),
                    i.key_pressed(egui::Key::Q) || i.key_pressed(egui::Key::Escape),
                    i.key_pressed(egui::Key::F) || i.key_pressed(egui::Key::F11),
                )
            });
            if graphs {
                self.show_graphs = !self.show_graphs;
            }
            if theme {
                self.theme_index = (self.theme_index + 1) % self.all_themes.len();
                self.theme = self.all_themes[self.theme_index].clone();
                info!("Tema: {}", self.theme.name);
            }
            if quit {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            if fullscreen {
                self.is_fullscreen = !self.is_fullscreen;
                ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.is_fullscreen));
            }
        }

        // ── Painel central ──
        egui::CentralPanel::default().show(ctx, |ui: &mut egui::Ui| {
            ui.vertical_centered(|ui: &mut egui::Ui| {
                ui.label(
                    RichText::new("👟 SHOE CABINET 👟")
                        .color(self.theme.title)
                        .size(22.0)
                        .strong()
                        .monospace(),
                );
            });

            self.render_status(ui);
            if can_reconnect(self.loop_state()) && ui.button("Reconectar").clicked() {
                self.connect();
            }
            ui.add_space(8.0);

            // ── Sensores | Ciclo ──
            let th = &self.config.alerts;
            ui.columns(4, |cols| {
                for (i, sensor) in SensorId::ALL.iter().enumerate() {
                    panels::render_sensor(
                        &mut cols[i],
                        *sensor,
                        self.config.chamber_of(*sensor),
                        self.state.reading(*sensor),
                        &self.theme,
                        th,
                    );
                }
                panels::render_drying(&mut cols[3], &self.state, self.heater_on, &self.theme);
            });

            ui.add_space(6.0);
            self.render_controls(ui);

            if let Some(prediction) = &self.prediction {
                ui.add_space(6.0);
                panels::render_prediction(ui, prediction, self.runner_up_chosen, &self.theme);
            }

            // ── Gráficos ──
            if self.show_graphs {
                ui.add_space(8.0);
                ui.separator();
                self.render_graphs(ui);
            }

            // ── Help bar (fundo) ──
            ui.with_layout(egui::Layout::bottom_up(egui::Align::Center), |ui: &mut egui::Ui| {
                ui.label(
                    RichText::new("[F] Fullscreen | [G] Graphs | [T] Theme | [Q/Esc] Quit")
                        .color(self.theme.dim)
                        .monospace()
                        .size(10.0),
                );
            });
        });
    }
}

/// Sem loop rodando (porta nunca aberta ou thread encerrada) o usuário
/// pode tentar abrir a porta de novo.
fn can_reconnect(state: Option<LoopState>) -> bool {
    state != Some(LoopState::Running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_offered_whenever_loop_is_not_running() {
        assert!(can_reconnect(None));
        assert!(can_reconnect(Some(LoopState::Stopped)));
        assert!(!can_reconnect(Some(LoopState::Running)));
    }
}
