use crate::error::WizardError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// The profile form fields the wizard can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormField {
    Name,
    Location,
    Industry,
    Profession,
    Experience,
    Role,
    ProjectCategory,
    LookingFor,
}

impl FormField {
    pub const ALL: [FormField; 8] = [
        FormField::Name,
        FormField::Location,
        FormField::Industry,
        FormField::Profession,
        FormField::Experience,
        FormField::Role,
        FormField::ProjectCategory,
        FormField::LookingFor,
    ];

    /// The stable identifier used on the wire and in the host form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Location => "location",
            FormField::Industry => "industry",
            FormField::Profession => "profession",
            FormField::Experience => "experience",
            FormField::Role => "role",
            FormField::ProjectCategory => "projectCategory",
            FormField::LookingFor => "lookingFor",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| WizardError::UnknownField(s.to_string()))
    }
}

/// One question of the interview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionStep {
    pub field: FormField,
    /// Short label shown in the UI.
    pub question: &'static str,
    /// Text spoken to the user.
    pub prompt: &'static str,
}

pub const WIZARD_STEPS: [QuestionStep; 8] = [
    QuestionStep {
        field: FormField::Name,
        question: "What is your full name?",
        prompt: "Please tell me your full name.",
    },
    QuestionStep {
        field: FormField::Location,
        question: "Where are you located?",
        prompt: "What city and country are you located in?",
    },
    QuestionStep {
        field: FormField::Industry,
        question: "What industry do you work in?",
        prompt: "What industry do you specialize in? For example, technology, healthcare, finance, education, retail, or manufacturing.",
    },
    QuestionStep {
        field: FormField::Profession,
        question: "What is your profession?",
        prompt: "What is your current profession or job title?",
    },
    QuestionStep {
        field: FormField::Experience,
        question: "How many years of experience do you have?",
        prompt: "How many years of professional experience do you have? You can say something like 2 years, 5 years, or 10 plus years.",
    },
    QuestionStep {
        field: FormField::Role,
        question: "What is your role?",
        prompt: "What best describes your role? Are you an entrepreneur, product owner, designer, founder, investor, or partner?",
    },
    QuestionStep {
        field: FormField::ProjectCategory,
        question: "What types of projects interest you?",
        prompt: "What types of projects are you most interested in working on? Please describe the kind of work that excites you.",
    },
    QuestionStep {
        field: FormField::LookingFor,
        question: "Who are you looking to meet?",
        prompt: "What types of people are you looking to connect with? Describe the kind of collaborators or partners you want to meet.",
    },
];

/// An ordered, validated list of steps. Never empty, no field appears twice.
#[derive(Debug, Clone)]
pub struct StepList {
    steps: Vec<QuestionStep>,
}

impl StepList {
    pub fn new(steps: Vec<QuestionStep>) -> Result<Self, WizardError> {
        if steps.is_empty() {
            return Err(WizardError::EmptySteps);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.field) {
                return Err(WizardError::DuplicateField(step.field));
            }
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QuestionStep> {
        self.steps.get(index)
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionStep> {
        self.steps.iter()
    }
}

impl Index<usize> for StepList {
    type Output = QuestionStep;

    fn index(&self, index: usize) -> &QuestionStep {
        &self.steps[index]
    }
}

impl Default for StepList {
    fn default() -> Self {
        Self {
            steps: WIZARD_STEPS.to_vec(),
        }
    }
}

/// How far through the interview the user is. Display only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// 1-based step number.
    pub step: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(current_index: usize, total: usize) -> Self {
        Self {
            step: current_index + 1,
            total,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.step as f64 / self.total as f64
    }

    /// Rounded percentage, e.g. 13 for step 1 of 8.
    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Step {} of {} ({}% Complete)",
            self.step,
            self.total,
            self.percent()
        )
    }
}
