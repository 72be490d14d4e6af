use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::application::ports::SpeechPort;
use crate::domain::{
    config::SpeechConfig,
    errors::{DomainError, DomainResult},
};

/// Voz local: `piper --output_raw | aplay`.
///
/// Ambos procesos se crean con `kill_on_drop`, así que abortar la tarea que
/// espera a `speak` corta la locución en curso.
pub struct PiperSpeech {
    piper_path: String,
    model_path: String,
    sample_rate: u32,
}

impl PiperSpeech {
    pub fn new(cfg: &SpeechConfig) -> Self {
        Self {
            piper_path: cfg.piper_path.clone(),
            model_path: cfg.voice_model_path.clone(),
            sample_rate: cfg.sample_rate,
        }
    }

    pub fn is_available(&self) -> bool {
        Path::new(&self.piper_path).exists() && Path::new(&self.model_path).exists()
    }
}

fn speech_err(what: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::SpeechOutputFailure(format!("{}: {}", what, e))
}

#[async_trait]
impl SpeechPort for PiperSpeech {
    async fn speak(&self, text: &str) -> DomainResult<()> {
        if !Path::new(&self.model_path).exists() {
            error!("❌ VOICE MODEL NOT FOUND: {}", self.model_path);
            return Err(DomainError::SpeechOutputFailure(format!(
                "modelo de voz no encontrado: {}",
                self.model_path
            )));
        }

        let mut piper = Command::new(&self.piper_path)
            .args(["--model", &self.model_path, "--output_raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| speech_err("no se pudo lanzar piper", e))?;

        let raw: Stdio = piper
            .stdout
            .take()
            .ok_or_else(|| speech_err("piper", "sin stdout"))?
            .try_into()
            .map_err(|e| speech_err("piper stdout", e))?;

        let rate = self.sample_rate.to_string();
        let mut aplay = Command::new("aplay")
            .args(["-q", "-r", &rate, "-f", "S16_LE", "-t", "raw"])
            .stdin(raw)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| speech_err("no se pudo lanzar aplay", e))?;

        if let Some(mut stdin) = piper.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| speech_err("escritura a piper", e))?;
            // Cerrar stdin marca el fin del texto.
            drop(stdin);
        }

        let status = aplay.wait().await.map_err(|e| speech_err("aplay", e))?;
        let _ = piper.wait().await;
        debug!("Locución terminada ({}): {}", status, text);

        if status.success() {
            Ok(())
        } else {
            Err(DomainError::SpeechOutputFailure(format!("aplay terminó con {}", status)))
        }
    }
}
