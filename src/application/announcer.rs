//! Planificador de anuncios por voz.
//!
//! Máquina de estados `Idle -> Debouncing -> Speaking` sin temporizadores
//! propios: guarda los plazos como `Instant` y el bucle de la sesión duerme
//! hasta `next_deadline()` y llama a `fire_due()`. Así cancelar es borrar los
//! plazos y ningún temporizador puede dispararse después.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::config::SpeechConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    Speaking,
}

/// Acciones que el llamador debe ejecutar sobre la salida de voz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEffect {
    Speak { id: u64, text: String },
    CancelSpeech,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    Finished,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub debounce: Duration,
    pub settle: Duration,
    pub repeat: Option<Duration>,
}

impl From<&SpeechConfig> for Timings {
    fn from(cfg: &SpeechConfig) -> Self {
        Self {
            debounce: cfg.debounce(),
            settle: cfg.settle(),
            repeat: cfg.repeat(),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Timings::from(&SpeechConfig::default())
    }
}

pub struct AnnouncementScheduler {
    timings: Timings,
    phase: Phase,
    last_spoken: Option<String>,
    /// Último mensaje mostrado, aunque no se haya pronunciado.
    current: Option<String>,
    /// Hueco único: el más reciente sobrescribe.
    pending: Option<String>,
    in_flight: Option<(u64, String)>,
    debounce_deadline: Option<Instant>,
    settle: Option<(Instant, String)>,
    repeat: Option<(Instant, String)>,
    next_id: u64,
}

impl AnnouncementScheduler {
    pub fn new(mut timings: Timings) -> Self {
        timings.repeat = timings.repeat.filter(|p| !p.is_zero());
        Self {
            timings,
            phase: Phase::Idle,
            last_spoken: None,
            current: None,
            pending: None,
            in_flight: None,
            debounce_deadline: None,
            settle: None,
            repeat: None,
            next_id: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_spoken(&self) -> Option<&str> {
        self.last_spoken.as_deref()
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.debounce_deadline,
            self.settle.as_ref().map(|(at, _)| *at),
            self.repeat.as_ref().map(|(at, _)| *at),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn notify(&mut self, message: &str, now: Instant) {
        self.current = Some(message.to_string());

        match self.phase {
            Phase::Speaking => {
                let same = self.in_flight.as_ref().is_some_and(|(_, t)| t == message);
                if same {
                    self.pending = None;
                } else {
                    self.pending = Some(message.to_string());
                }
            }
            Phase::Debouncing => {
                if self.pending.as_deref() == Some(message) {
                    return;
                }
                self.pending = Some(message.to_string());
                self.debounce_deadline = Some(now + self.timings.debounce);
            }
            Phase::Idle => {
                self.settle = None;
                if self.last_spoken.as_deref() == Some(message) {
                    // Ya dicho: la repetición periódica se encarga.
                    return;
                }
                self.pending = Some(message.to_string());
                self.phase = Phase::Debouncing;
                self.debounce_deadline = Some(now + self.timings.debounce);
            }
        }
    }

    /// Dispara todos los plazos vencidos a `now`, en orden cronológico.
    pub fn fire_due(&mut self, now: Instant) -> Vec<SpeechEffect> {
        let mut effects = Vec::new();
        while let Some(at) = self.next_deadline().filter(|at| *at <= now) {
            if self.debounce_deadline == Some(at) {
                self.debounce_deadline = None;
                self.on_debounce(at, &mut effects);
            } else if self.settle.as_ref().is_some_and(|(t, _)| *t == at) {
                if let Some((_, message)) = self.settle.take() {
                    self.notify(&message, at);
                }
            } else if let Some((_, armed)) = self.repeat.take() {
                self.on_repeat(armed, at, &mut effects);
            }
        }
        effects
    }

    fn on_debounce(&mut self, now: Instant, effects: &mut Vec<SpeechEffect>) {
        let Some(message) = self.pending.take() else {
            self.phase = Phase::Idle;
            return;
        };
        if self.phase == Phase::Speaking {
            self.pending = Some(message);
            return;
        }
        effects.push(self.start_speaking(message, now));
    }

    fn on_repeat(&mut self, armed: String, now: Instant, effects: &mut Vec<SpeechEffect>) {
        let unchanged = self.current.as_deref() == Some(armed.as_str());
        if unchanged && self.phase == Phase::Idle {
            debug!("Repitiendo anuncio: {}", armed);
            effects.push(self.start_speaking(armed, now));
        } else if let Some(period) = self.timings.repeat {
            self.repeat = Some((now + period, armed));
        }
    }

    fn start_speaking(&mut self, text: String, now: Instant) -> SpeechEffect {
        let id = self.next_id;
        self.next_id += 1;
        self.phase = Phase::Speaking;
        self.in_flight = Some((id, text.clone()));
        self.last_spoken = Some(text.clone());
        if let Some(period) = self.timings.repeat {
            self.repeat = Some((now + period, text.clone()));
        }
        SpeechEffect::Speak { id, text }
    }

    /// Fin (o fallo) de una locución. Los ids antiguos se ignoran: una
    /// locución cancelada puede terminar después de que empiece otra.
    pub fn speech_finished(&mut self, id: u64, outcome: SpeechOutcome, now: Instant) {
        if self.in_flight.as_ref().map(|(i, _)| *i) != Some(id) {
            debug!("Fin de locución obsoleta #{}", id);
            return;
        }
        if let SpeechOutcome::Failed(reason) = outcome {
            warn!("⚠️ Falló la locución #{}: {}", id, reason);
        }
        self.in_flight = None;
        self.phase = Phase::Idle;
        if let Some(message) = self.pending.take() {
            self.settle = Some((now + self.timings.settle, message));
        }
    }

    /// Corta la voz en curso y olvida todo el estado y los plazos.
    pub fn cancel(&mut self) -> SpeechEffect {
        // Los ids siguen creciendo para que una finalización tardía no case
        // con una locución nueva.
        let next_id = self.next_id;
        *self = Self::new(self.timings);
        self.next_id = next_id;
        SpeechEffect::CancelSpeech
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn spoken(effects: &[SpeechEffect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                SpeechEffect::Speak { text, .. } => Some(text.as_str()),
                SpeechEffect::CancelSpeech => None,
            })
            .collect()
    }

    fn speak_id(effects: &[SpeechEffect]) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                SpeechEffect::Speak { id, .. } => Some(*id),
                SpeechEffect::CancelSpeech => None,
            })
            .unwrap()
    }

    #[test]
    fn rapid_updates_coalesce_into_one_utterance() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("A", t0);
        s.notify("B", t0);
        assert!(s.fire_due(t0 + ms(299)).is_empty());
        let effects = s.fire_due(t0 + ms(300));
        assert_eq!(spoken(&effects), vec!["B"]);
        assert!(s.fire_due(t0 + ms(1000)).is_empty());
    }

    #[test]
    fn newer_notify_restarts_debounce() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("A", t0);
        s.notify("B", t0 + ms(200));
        assert!(s.fire_due(t0 + ms(300)).is_empty());
        assert_eq!(spoken(&s.fire_due(t0 + ms(500))), vec!["B"]);
    }

    #[test]
    fn same_message_does_not_retrigger() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings { repeat: None, ..Timings::default() });
        s.notify("A", t0);
        s.notify("A", t0 + ms(250));
        let effects = s.fire_due(t0 + ms(300));
        assert_eq!(spoken(&effects), vec!["A"]);
        s.notify("A", t0 + ms(400));
        s.speech_finished(speak_id(&effects), SpeechOutcome::Finished, t0 + ms(800));
        s.notify("A", t0 + ms(900));
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn message_during_speech_waits_and_settles() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("A", t0);
        let first = s.fire_due(t0 + ms(300));
        s.notify("B", t0 + ms(400));
        s.notify("C", t0 + ms(450));
        assert_eq!(s.pending(), Some("C"));

        s.speech_finished(speak_id(&first), SpeechOutcome::Finished, t0 + ms(1000));
        assert_eq!(s.phase(), Phase::Idle);
        // 100 ms de asentamiento + 300 ms de debounce
        assert!(s.fire_due(t0 + ms(1399)).is_empty());
        assert_eq!(spoken(&s.fire_due(t0 + ms(1400))), vec!["C"]);
        assert_eq!(s.last_spoken(), Some("C"));
    }

    #[test]
    fn returning_to_in_flight_message_drops_pending() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("A", t0);
        let first = s.fire_due(t0 + ms(300));
        s.notify("B", t0 + ms(400));
        s.notify("A", t0 + ms(500));
        assert_eq!(s.pending(), None);
        s.speech_finished(speak_id(&first), SpeechOutcome::Finished, t0 + ms(900));
        assert!(s.fire_due(t0 + ms(2000)).is_empty());
    }

    #[test]
    fn unchanged_message_repeats_periodically() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("stop", t0);

        let mut texts = Vec::new();
        let mut now = t0;
        while let Some(at) = s.next_deadline() {
            if at > t0 + Duration::from_secs(10) {
                break;
            }
            now = at;
            let effects = s.fire_due(now);
            for e in &effects {
                if let SpeechEffect::Speak { id, text } = e {
                    texts.push(text.clone());
                    s.speech_finished(*id, SpeechOutcome::Finished, now + ms(500));
                }
            }
            // la detección sigue llegando con el mismo mensaje
            s.notify("stop", now + ms(600));
        }
        assert!(now > t0);
        assert!(texts.len() >= 3, "only {} utterances", texts.len());
        assert!(texts.iter().all(|t| t == "stop"));
    }

    #[test]
    fn repeat_skips_changed_or_busy_message() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings { debounce: ms(300), settle: ms(100), repeat: Some(ms(3000)) });
        s.notify("A", t0);
        let first = s.fire_due(t0 + ms(300));
        // la locución dura más que el periodo de repetición
        assert!(s.fire_due(t0 + ms(3300)).is_empty());
        assert_eq!(s.phase(), Phase::Speaking);
        s.speech_finished(speak_id(&first), SpeechOutcome::Finished, t0 + ms(3400));
        // se rearmó: vuelve a sonar en el siguiente periodo
        assert_eq!(spoken(&s.fire_due(t0 + ms(6300))), vec!["A"]);
    }

    #[test]
    fn failed_speech_returns_to_idle_without_retry() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings { repeat: None, ..Timings::default() });
        s.notify("A", t0);
        let effects = s.fire_due(t0 + ms(300));
        s.speech_finished(speak_id(&effects), SpeechOutcome::Failed("no audio".into()), t0 + ms(400));
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.next_deadline(), None);
        s.notify("B", t0 + ms(500));
        assert_eq!(spoken(&s.fire_due(t0 + ms(800))), vec!["B"]);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("A", t0);
        let first = s.fire_due(t0 + ms(300));
        s.speech_finished(speak_id(&first) + 7, SpeechOutcome::Finished, t0 + ms(400));
        assert_eq!(s.phase(), Phase::Speaking);
    }

    #[test]
    fn cancel_clears_every_deadline() {
        let t0 = Instant::now();
        let mut s = AnnouncementScheduler::new(Timings::default());
        s.notify("A", t0);
        let first = s.fire_due(t0 + ms(300));
        s.notify("B", t0 + ms(400));
        assert_eq!(s.cancel(), SpeechEffect::CancelSpeech);
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.next_deadline(), None);
        assert!(s.fire_due(t0 + Duration::from_secs(60)).is_empty());
        // una finalización tardía de la locución cancelada no reabre nada
        s.speech_finished(speak_id(&first), SpeechOutcome::Finished, t0 + ms(500));
        assert_eq!(s.next_deadline(), None);
    }
}
