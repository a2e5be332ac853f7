//! Recommendation Wizard
//!
//! A finite-state decision tree turning a sequence of answers into a
//! hardware recommendation. Every transition lives in [`TRANSITIONS`]; the
//! session only walks the table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::DssError;

/// Application the user wants equipment for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    WaterPumping,
    Refrigeration,
    Drying,
    Cooking,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::WaterPumping,
        Domain::Refrigeration,
        Domain::Drying,
        Domain::Cooking,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::WaterPumping => "water-pumping",
            Domain::Refrigeration => "refrigeration",
            Domain::Drying => "drying",
            Domain::Cooking => "cooking",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = DssError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Domain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == wanted)
            .ok_or_else(|| DssError::validation(format!("Unknown wizard domain '{}'", s.trim())))
    }
}

/// Terminal output of a wizard session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub model: String,
    pub note: Option<String>,
}

/// What an answer leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Next(u8),
    Terminal {
        model: &'static str,
        note: Option<&'static str>,
    },
    /// Records the burner count, then asks about the pressure cooker
    CookerBurner,
    /// Finishes the cooker package, with the pressure cooker if `true`
    CookerAddOn(bool),
}

/// One row of the decision table
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub domain: Domain,
    pub step: u8,
    pub answer: &'static str,
    pub outcome: Outcome,
}

const fn row(domain: Domain, step: u8, answer: &'static str, outcome: Outcome) -> Transition {
    Transition {
        domain,
        step,
        answer,
        outcome,
    }
}

const fn terminal(model: &'static str, note: Option<&'static str>) -> Outcome {
    Outcome::Terminal { model, note }
}

const COOKING_BURNER_STEP: u8 = 2;
const PRESSURE_COOKER_ADD_ON: &str = "electric pressure cooker add-on";

/// The complete decision table
pub const TRANSITIONS: &[Transition] = &[
    // Water pumping
    row(Domain::WaterPumping, 1, "surface", terminal("DHFS300", Some("1500W motor; 6×335W PV"))),
    row(Domain::WaterPumping, 1, "underground", Outcome::Next(2)),
    row(Domain::WaterPumping, 2, "<30m", Outcome::Next(3)),
    row(
        Domain::WaterPumping,
        2,
        "31-40m",
        terminal("SUNFLO-B 500C", Some("500W; 4×200W PV; max 6 m³/day")),
    ),
    row(
        Domain::WaterPumping,
        2,
        "41-50m",
        terminal("SUNFLO-A 270H", Some("270W; 4×200W PV; max 3 m³/day")),
    ),
    row(
        Domain::WaterPumping,
        2,
        "51-60m",
        terminal("SUNFLO-S 300", Some("300W; 2×200W PV; max 3 m³/day")),
    ),
    row(Domain::WaterPumping, 2, "61-70m", Outcome::Next(7)),
    row(Domain::WaterPumping, 3, "1 m³", terminal("SUNFLO-S 150", None)),
    row(Domain::WaterPumping, 3, "2 m³", terminal("SUNFLO-A 150H", None)),
    row(Domain::WaterPumping, 3, "3 m³", terminal("SUNFLO-B 120H", None)),
    row(Domain::WaterPumping, 7, "4 m³", terminal("SUNFLO-A 600H", Some("600W"))),
    row(
        Domain::WaterPumping,
        7,
        "12 m³",
        terminal("SUNFLO-B 1000C", Some("1000W; 8×200W PV")),
    ),
    // Refrigeration; the first two bands overlap at 51-54L
    row(Domain::Refrigeration, 1, "<55L", terminal("SUNFRIDGE 55", Some("80W"))),
    row(Domain::Refrigeration, 1, "51-130L", terminal("SUNFRIDGE 130", Some("128W"))),
    row(Domain::Refrigeration, 1, "131-240L", terminal("SUNFRIDGE 240", Some("150W"))),
    // Drying
    row(
        Domain::Drying,
        1,
        "passive",
        terminal("Grekkon Ltd", Some("Supplier of passive solar dryers")),
    ),
    row(
        Domain::Drying,
        1,
        "active",
        terminal("Aqua Hub Kenya", Some("Supplier of active solar dryers")),
    ),
    // Cooking
    row(Domain::Cooking, 1, "single", Outcome::CookerBurner),
    row(Domain::Cooking, 1, "double", Outcome::CookerBurner),
    row(Domain::Cooking, COOKING_BURNER_STEP, "yes", Outcome::CookerAddOn(true)),
    row(Domain::Cooking, COOKING_BURNER_STEP, "no", Outcome::CookerAddOn(false)),
];

fn transitions(domain: Domain, step: u8) -> impl Iterator<Item = &'static Transition> {
    TRANSITIONS
        .iter()
        .filter(move |t| t.domain == domain && t.step == step)
}

/// Where a session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardState {
    /// No domain selected
    Menu,
    Asking { domain: Domain, step: u8 },
    Complete,
}

/// Result of a single answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Next { domain: Domain, step: u8 },
    Done(Recommendation),
}

/// Single-user wizard session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    state: WizardState,
    answers: Vec<String>,
    burner: Option<String>,
    recommendation: Option<Recommendation>,
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: WizardState::Menu,
            answers: Vec::new(),
            burner: None,
            recommendation: None,
        }
    }

    /// Replay `answers` for `domain` on a fresh session
    pub fn replay<S: AsRef<str>>(domain: Domain, answers: &[S]) -> crate::Result<Self> {
        let mut session = Self::new();
        session.start(domain);
        for answer in answers {
            session.answer(answer.as_ref())?;
        }
        Ok(session)
    }

    /// Select a domain, discarding any previous progress
    pub fn start(&mut self, domain: Domain) {
        self.restart();
        debug!("Wizard started for {}", domain);
        self.state = WizardState::Asking { domain, step: 1 };
    }

    /// Back to the menu with no answers
    pub fn restart(&mut self) {
        self.state = WizardState::Menu;
        self.answers.clear();
        self.burner = None;
        self.recommendation = None;
    }

    /// Apply one answer
    pub fn answer(&mut self, value: &str) -> crate::Result<Progress> {
        let WizardState::Asking { domain, step } = self.state else {
            return Err(DssError::invalid_transition(format!(
                "no question is pending, cannot answer '{value}'"
            )));
        };

        let wanted = value.trim();
        let transition = transitions(domain, step)
            .find(|t| t.answer.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                DssError::invalid_transition(format!(
                    "'{wanted}' is not an option for {domain} step {step}"
                ))
            })?;

        self.answers.push(transition.answer.to_string());

        let recommendation = match transition.outcome {
            Outcome::Next(next) => {
                self.state = WizardState::Asking { domain, step: next };
                return Ok(Progress::Next { domain, step: next });
            }
            Outcome::CookerBurner => {
                self.burner = Some(transition.answer.to_string());
                self.state = WizardState::Asking {
                    domain,
                    step: COOKING_BURNER_STEP,
                };
                return Ok(Progress::Next {
                    domain,
                    step: COOKING_BURNER_STEP,
                });
            }
            Outcome::Terminal { model, note } => Recommendation {
                model: model.to_string(),
                note: note.map(str::to_string),
            },
            Outcome::CookerAddOn(with_pressure_cooker) => {
                cooker_package(self.burner.as_deref(), with_pressure_cooker)
            }
        };

        debug!("Wizard recommends {}", recommendation.model);
        self.state = WizardState::Complete;
        self.recommendation = Some(recommendation.clone());
        Ok(Progress::Done(recommendation))
    }

    /// Answers accepted in the current state
    #[must_use]
    pub fn options(&self) -> Vec<&'static str> {
        match self.state {
            WizardState::Asking { domain, step } => {
                transitions(domain, step).map(|t| t.answer).collect()
            }
            WizardState::Menu | WizardState::Complete => Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> WizardState {
        self.state
    }

    #[must_use]
    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    #[must_use]
    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }
}

fn cooker_package(burner: Option<&str>, with_pressure_cooker: bool) -> Recommendation {
    let burners = match burner {
        Some("double") => "Double",
        _ => "Single",
    };
    let model = if with_pressure_cooker {
        format!("{burners}-burner solar e-cooker + {PRESSURE_COOKER_ADD_ON}")
    } else {
        format!("{burners}-burner solar e-cooker")
    };
    Recommendation { model, note: None }
}
