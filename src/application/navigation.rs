//! Motor de decisión: convierte un `DetectionResult` en una `GuidanceState`
//! evaluando una lista ordenada de reglas puras (gana la primera que aplica).

use crate::application::arrows::{synthesize, SynthesisParams};
use crate::domain::config::{GuidancePolicy, WarningsPolicy};
use crate::domain::detection::{Arrow, DetectionResult, NavDirection, NavState, Navigation, Obstacles};
use crate::domain::geometry::{classify_direction, sub};
use crate::domain::guidance::{GuidanceState, Severity};

pub const MSG_PROCESSING: &str = "processing";
pub const MSG_OBSTACLE: &str = "obstacle detected";
pub const MSG_SOUND_SIGNAL: &str = "audible signal detected";
pub const MSG_STOP_BLOCK: &str = "tactile stop block detected";
pub const MSG_STRAIGHT: &str = "go straight";
pub const MSG_INTERSECTION: &str = "intersection detected";
pub const MSG_CHECKING: &str = "checking route";

/// Lo que ve cada regla. Las direcciones se derivan una sola vez por decisión.
pub struct RuleInput<'a> {
    pub result: &'a DetectionResult,
    pub policy: &'a GuidancePolicy,
    pub directions: Vec<String>,
}

impl RuleInput<'_> {
    fn navigation(&self) -> Option<&Navigation> {
        self.result.navigation.as_ref()
    }
}

pub type RuleFn = fn(&RuleInput<'_>) -> Option<GuidanceState>;

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: RuleFn,
}

const NO_NAVIGATION: Rule = Rule { name: "no_navigation", apply: rule_no_navigation };
const WARNINGS: Rule = Rule { name: "warnings", apply: rule_warnings };
const OBSTACLE: Rule = Rule { name: "obstacle", apply: rule_obstacle };
const SOUND_SIGNAL: Rule = Rule { name: "sound_signal", apply: rule_sound_signal };
const STOP: Rule = Rule { name: "stop", apply: rule_stop };
const ARROWS: Rule = Rule { name: "arrows", apply: rule_arrows };
const STRAIGHT: Rule = Rule { name: "straight", apply: rule_straight };
const INTERSECTION: Rule = Rule { name: "intersection", apply: rule_intersection };
const FALLBACK: Rule = Rule { name: "fallback", apply: rule_fallback };

/// Orden de evaluación según la política de avisos.
pub fn rules_for(policy: WarningsPolicy) -> Vec<Rule> {
    let core = [OBSTACLE, SOUND_SIGNAL, STOP, ARROWS, STRAIGHT, INTERSECTION];
    let mut rules = vec![NO_NAVIGATION];
    match policy {
        WarningsPolicy::Precedence => {
            rules.push(WARNINGS);
            rules.extend(core);
        }
        WarningsPolicy::Fallback => {
            rules.extend(core);
            rules.push(WARNINGS);
        }
        WarningsPolicy::Ignore => rules.extend(core),
    }
    rules.push(FALLBACK);
    rules
}

pub struct NavigationEngine {
    policy: GuidancePolicy,
    rules: Vec<Rule>,
}

impl NavigationEngine {
    pub fn new(policy: GuidancePolicy) -> Self {
        let rules = rules_for(policy.warnings_policy);
        Self { policy, rules }
    }

    /// Función pura: el mismo resultado produce siempre la misma guía.
    pub fn decide(&self, result: &DetectionResult) -> GuidanceState {
        let input = RuleInput {
            result,
            policy: &self.policy,
            directions: derive_directions(result, &self.policy),
        };
        self.rules
            .iter()
            .find_map(|rule| (rule.apply)(&input))
            .unwrap_or_else(|| GuidanceState::new(MSG_CHECKING, Severity::Neutral))
    }
}

/// Etiquetas de dirección de cada flecha, sin duplicados y en orden de aparición.
pub fn directions_from_arrows(arrows: &[Arrow]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (start, end) in arrows.iter().filter_map(Arrow::endpoints) {
        let label = classify_direction(&sub(&end, &start)).label();
        if !out.iter().any(|d| d == label) {
            out.push(label.to_string());
        }
    }
    out
}

fn derive_directions(result: &DetectionResult, policy: &GuidancePolicy) -> Vec<String> {
    if !result.arrows().is_empty() {
        return directions_from_arrows(result.arrows());
    }
    match (&result.block_details, policy.synthesize_arrows) {
        (Some(details), true) => {
            // La longitud no afecta a la dirección.
            let params = SynthesisParams {
                proximity_factor: policy.proximity_factor,
                cluster_angle_deg: policy.cluster_angle_deg,
                arrow_length: 1.0,
            };
            directions_from_arrows(&synthesize(details, &params).arrows)
        }
        _ => Vec::new(),
    }
}

/// El mismo obstáculo puede venir por cuatro vías distintas según el productor:
/// lista de obstáculos, cadena de obstáculos, clase de las cajas o lista plana
/// de clases. Se comprueban todas.
pub fn has_obstacle(result: &DetectionResult, class: &str) -> bool {
    let needle = class.to_lowercase();
    let in_nav = result.navigation.as_ref().is_some_and(|nav| match &nav.obstacles {
        Obstacles::List(items) => items.iter().any(|o| o.eq_ignore_ascii_case(class)),
        Obstacles::Text(text) => text.to_lowercase().contains(&needle),
    });
    in_nav
        || result.boxes().iter().any(|b| b.class_name.eq_ignore_ascii_case(class))
        || result.classes().iter().any(|c| c.eq_ignore_ascii_case(class))
}

fn rule_no_navigation(input: &RuleInput<'_>) -> Option<GuidanceState> {
    input
        .navigation()
        .is_none()
        .then(|| GuidanceState::new(MSG_PROCESSING, Severity::Neutral))
}

fn rule_warnings(input: &RuleInput<'_>) -> Option<GuidanceState> {
    let first = input.navigation()?.warnings.first()?;
    Some(GuidanceState::new(first.clone(), Severity::Warning))
}

fn rule_obstacle(input: &RuleInput<'_>) -> Option<GuidanceState> {
    has_obstacle(input.result, &input.policy.obstacle_class)
        .then(|| GuidanceState::new(MSG_OBSTACLE, Severity::Danger))
}

fn rule_sound_signal(input: &RuleInput<'_>) -> Option<GuidanceState> {
    input
        .navigation()?
        .signals
        .sound_button
        .then(|| GuidanceState::new(MSG_SOUND_SIGNAL, Severity::Info))
}

fn rule_stop(input: &RuleInput<'_>) -> Option<GuidanceState> {
    if input.navigation()?.direction != NavDirection::Stop {
        return None;
    }
    if input.directions.is_empty() {
        return Some(GuidanceState::new(MSG_STOP_BLOCK, Severity::Warning));
    }
    let message = format!("stop: possible directions {}", input.directions.join(", "));
    Some(GuidanceState::new(message, Severity::Warning).with_directions(input.directions.clone()))
}

fn rule_arrows(input: &RuleInput<'_>) -> Option<GuidanceState> {
    match input.directions.as_slice() {
        [] => None,
        [only] => Some(
            GuidanceState::new(format!("go toward {}", only), Severity::Success)
                .with_directions(input.directions.clone()),
        ),
        many => Some(
            GuidanceState::new(format!("you may go toward {}", many.join(", ")), Severity::Warning)
                .with_directions(input.directions.clone()),
        ),
    }
}

fn rule_straight(input: &RuleInput<'_>) -> Option<GuidanceState> {
    (input.navigation()?.state == NavState::Straight)
        .then(|| GuidanceState::new(MSG_STRAIGHT, Severity::Success).with_directions(vec!["up".into()]))
}

fn rule_intersection(input: &RuleInput<'_>) -> Option<GuidanceState> {
    (input.navigation()?.state == NavState::Intersection)
        .then(|| GuidanceState::new(MSG_INTERSECTION, Severity::Warning))
}

fn rule_fallback(_: &RuleInput<'_>) -> Option<GuidanceState> {
    Some(GuidanceState::new(MSG_CHECKING, Severity::Neutral))
}
