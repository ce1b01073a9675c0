//! Reconhecimento do tipo de sapato.
//!
//! A captura da foto e a inferência do modelo rodam fora do processo. Aqui
//! ficam os contratos ([`Camera`], [`ShoeClassifier`]), as implementações que
//! chamam comandos externos e a interpretação das probabilidades.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Rótulos do modelo, na ordem da saída do classificador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShoeType {
    Boots,
    Shoes,
    Slipper,
    Sneakers,
}

impl ShoeType {
    pub const ALL: [ShoeType; 4] = [
        ShoeType::Boots,
        ShoeType::Shoes,
        ShoeType::Slipper,
        ShoeType::Sneakers,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            ShoeType::Boots => "Botas",
            ShoeType::Shoes => "Sapato social",
            ShoeType::Slipper => "Chinelo",
            ShoeType::Sneakers => "Tênis",
        }
    }
}

impl fmt::Display for ShoeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Erros da câmera e do classificador.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Comando não configurado: {0}")]
    NotConfigured(&'static str),

    #[error("Falha ao executar {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command:?} terminou com status {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Saída inválida do classificador: {0}")]
    InvalidOutput(String),

    #[error("Esperadas {expected} probabilidades, recebidas {got}")]
    WrongLabelCount { expected: usize, got: usize },
}

/// Captura uma foto e devolve o caminho da imagem.
pub trait Camera {
    fn capture(&mut self) -> Result<PathBuf, VisionError>;
}

/// Classifica uma imagem; devolve uma probabilidade por [`ShoeType`].
pub trait ShoeClassifier {
    fn classify(&self, image_path: &Path) -> Result<Vec<f32>, VisionError>;
}

// ──────────────────────────────────────────────
// Predição
// ──────────────────────────────────────────────

/// Probabilidades ordenadas da mais provável para a menos provável.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    ranked: Vec<(ShoeType, f32)>,
}

impl Prediction {
    pub fn from_probabilities(probabilities: &[f32]) -> Result<Self, VisionError> {
        if probabilities.len() != ShoeType::ALL.len() {
            return Err(VisionError::WrongLabelCount {
                expected: ShoeType::ALL.len(),
                got: probabilities.len(),
            });
        }
        let mut ranked: Vec<(ShoeType, f32)> = ShoeType::ALL
            .iter()
            .copied()
            .zip(probabilities.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(Self { ranked })
    }

    /// Classe mais provável.
    pub fn best(&self) -> (ShoeType, f32) {
        self.ranked[0]
    }

    /// Segunda classe mais provável, usada em "reconhecer de novo".
    pub fn runner_up(&self) -> (ShoeType, f32) {
        self.ranked[1]
    }

    pub fn ranked(&self) -> &[(ShoeType, f32)] {
        &self.ranked
    }
}

/// Captura + classificação, chamado a partir de ações da UI.
pub fn recognize(
    camera: &mut dyn Camera,
    classifier: &dyn ShoeClassifier,
) -> Result<(PathBuf, Prediction), VisionError> {
    let image = camera.capture()?;
    let probabilities = classifier.classify(&image)?;
    let prediction = Prediction::from_probabilities(&probabilities)?;
    let (shoe, p) = prediction.best();
    info!("Sapato reconhecido: {shoe} ({:.0}%) em {}", p * 100.0, image.display());
    Ok((image, prediction))
}

// ──────────────────────────────────────────────
// Comandos externos
// ──────────────────────────────────────────────

/// Quebra uma linha de comando simples em programa + argumentos.
fn split_command(command_line: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

fn run_command(command_line: &str, extra_arg: &Path) -> Result<String, VisionError> {
    let (program, args) =
        split_command(command_line).ok_or(VisionError::NotConfigured("comando vazio"))?;
    debug!("Executando {program} {args:?} {}", extra_arg.display());

    let output = Command::new(&program)
        .args(&args)
        .arg(extra_arg)
        .output()
        .map_err(|source| VisionError::Spawn {
            command: command_line.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(VisionError::Failed {
            command: command_line.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Câmera que roda um comando externo recebendo o caminho de saída como
/// último argumento (ex: `rpicam-still --nopreview -o`).
#[derive(Debug, Clone)]
pub struct CommandCamera {
    command: String,
    output_path: PathBuf,
}

impl CommandCamera {
    pub fn new(command: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            output_path: output_path.into(),
        }
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self) -> Result<PathBuf, VisionError> {
        if self.command.trim().is_empty() {
            return Err(VisionError::NotConfigured("vision.capture_command"));
        }
        if let Some(dir) = self.output_path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| VisionError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        }
        run_command(&self.command, &self.output_path)?;
        Ok(self.output_path.clone())
    }
}

/// Classificador que roda um comando externo com o caminho da imagem como
/// último argumento e lê as probabilidades do stdout, separadas por vírgula
/// ou espaço.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    command: String,
}

impl CommandClassifier {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ShoeClassifier for CommandClassifier {
    fn classify(&self, image_path: &Path) -> Result<Vec<f32>, VisionError> {
        if self.command.trim().is_empty() {
            return Err(VisionError::NotConfigured("vision.classify_command"));
        }
        let stdout = run_command(&self.command, image_path)?;
        parse_probabilities(&stdout)
    }
}

/// Interpreta a saída do classificador (`0.1, 0.2 0.6,0.1`).
pub fn parse_probabilities(text: &str) -> Result<Vec<f32>, VisionError> {
    text.split(|c: char| c == ',' || c.is_whitespace() || c == '[' || c == ']')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| VisionError::InvalidOutput(tok.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCamera(PathBuf);

    impl Camera for FixedCamera {
        fn capture(&mut self) -> Result<PathBuf, VisionError> {
            Ok(self.0.clone())
        }
    }

    struct FixedClassifier(Vec<f32>);

    impl ShoeClassifier for FixedClassifier {
        fn classify(&self, _image_path: &Path) -> Result<Vec<f32>, VisionError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn labels_follow_model_order() {
        assert_eq!(ShoeType::from_index(0), Some(ShoeType::Boots));
        assert_eq!(ShoeType::from_index(3), Some(ShoeType::Sneakers));
        assert_eq!(ShoeType::from_index(4), None);
    }

    #[test]
    fn prediction_ranks_best_and_runner_up() {
        let p = Prediction::from_probabilities(&[0.1, 0.05, 0.25, 0.6]).unwrap();
        assert_eq!(p.best().0, ShoeType::Sneakers);
        assert_eq!(p.runner_up().0, ShoeType::Slipper);
    }

    #[test]
    fn prediction_rejects_wrong_length() {
        assert!(matches!(
            Prediction::from_probabilities(&[0.5, 0.5]),
            Err(VisionError::WrongLabelCount { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn parses_classifier_output() {
        assert_eq!(
            parse_probabilities("[0.1, 0.2 0.3,0.4]\n").unwrap(),
            vec![0.1, 0.2, 0.3, 0.4]
        );
        assert!(matches!(
            parse_probabilities("0.1 oops"),
            Err(VisionError::InvalidOutput(_))
        ));
    }

    #[test]
    fn recognize_chains_camera_and_classifier() {
        let mut camera = FixedCamera(PathBuf::from("data/pic.jpg"));
        let classifier = FixedClassifier(vec![0.7, 0.1, 0.1, 0.1]);
        let (image, prediction) = recognize(&mut camera, &classifier).unwrap();
        assert_eq!(image, PathBuf::from("data/pic.jpg"));
        assert_eq!(prediction.best().0, ShoeType::Boots);
    }

    #[test]
    fn unconfigured_commands_fail_cleanly() {
        let mut camera = CommandCamera::new("", "data/pic.jpg");
        assert!(matches!(
            camera.capture(),
            Err(VisionError::NotConfigured(_))
        ));
        let classifier = CommandClassifier::new("  ");
        assert!(matches!(
            classifier.classify(Path::new("x.jpg")),
            Err(VisionError::NotConfigured(_))
        ));
    }
}
