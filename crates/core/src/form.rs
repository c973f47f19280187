use crate::error::FormError;
use crate::steps::FormField;
use crate::{Command, Notice};
use serde::{Deserialize, Serialize};

/// Fields that must be filled in before the profile can be submitted.
pub const REQUIRED_FIELDS: [FormField; 3] =
    [FormField::Name, FormField::Location, FormField::Profession];

/// A value/label pair offered by a select field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

const fn option(value: &'static str, label: &'static str) -> SelectOption {
    SelectOption { value, label }
}

pub const INDUSTRY_OPTIONS: [SelectOption; 7] = [
    option("technology", "Technology"),
    option("healthcare", "Healthcare"),
    option("finance", "Finance"),
    option("education", "Education"),
    option("retail", "Retail"),
    option("manufacturing", "Manufacturing"),
    option("other", "Other"),
];

pub const EXPERIENCE_OPTIONS: [SelectOption; 5] = [
    option("0-1", "0-1 years"),
    option("2-3", "2-3 years"),
    option("4-5", "4-5 years"),
    option("6-10", "6-10 years"),
    option("10+", "10+ years"),
];

pub const ROLE_OPTIONS: [SelectOption; 6] = [
    option("entrepreneur", "Entrepreneur"),
    option("product-owner", "Product Owner"),
    option("designer", "Designer"),
    option("founder", "Founder"),
    option("investor", "Investor"),
    option("partner", "Partner"),
];

/// Label for `value` if it is one of `options`.
pub fn option_label(options: &[SelectOption], value: &str) -> Option<&'static str> {
    options
        .iter()
        .find(|option| option.value == value)
        .map(|option| option.label)
}

/// The community profile being filled in, by hand or by the voice wizard.
///
/// Values are stored exactly as entered (or transcribed); select fields are
/// not constrained to their option lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    pub name: String,
    pub location: String,
    pub industry: String,
    pub profession: String,
    pub experience: String,
    pub project_category: String,
    pub role: String,
    pub looking_for: String,
    pub interests: Vec<String>,
}

impl ProfileForm {
    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Location => &self.location,
            FormField::Industry => &self.industry,
            FormField::Profession => &self.profession,
            FormField::Experience => &self.experience,
            FormField::Role => &self.role,
            FormField::ProjectCategory => &self.project_category,
            FormField::LookingFor => &self.looking_for,
        }
    }

    fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Name => &mut self.name,
            FormField::Location => &mut self.location,
            FormField::Industry => &mut self.industry,
            FormField::Profession => &mut self.profession,
            FormField::Experience => &mut self.experience,
            FormField::Role => &mut self.role,
            FormField::ProjectCategory => &mut self.project_category,
            FormField::LookingFor => &mut self.looking_for,
        }
    }

    pub fn apply_field_update(&mut self, field: FormField, value: impl Into<String>) {
        *self.field_mut(field) = value.into();
    }

    /// Applies a wizard command. Returns true if the form changed.
    pub fn apply(&mut self, command: &Command) -> bool {
        match command {
            Command::UpdateField { field, value } => {
                self.apply_field_update(*field, value.clone());
                true
            }
            Command::Notify(_) | Command::Close => false,
        }
    }

    /// Adds a keyword. Empty strings and duplicates are ignored.
    pub fn add_interest(&mut self, interest: &str) -> bool {
        if interest.is_empty() || self.interests.iter().any(|i| i == interest) {
            return false;
        }
        self.interests.push(interest.to_string());
        true
    }

    pub fn remove_interest(&mut self, interest: &str) -> bool {
        let before = self.interests.len();
        self.interests.retain(|i| i != interest);
        self.interests.len() != before
    }

    pub fn missing_required(&self) -> Option<FormField> {
        REQUIRED_FIELDS
            .into_iter()
            .find(|field| self.field(*field).trim().is_empty())
    }

    pub fn submit(&self) -> Result<ProfileSubmission, FormError> {
        if let Some(field) = self.missing_required() {
            return Err(FormError::MissingField(field));
        }
        Ok(ProfileSubmission {
            profile: self.clone(),
        })
    }
}

/// A validated profile, ready to be handed to the interview scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSubmission {
    pub profile: ProfileForm,
}

impl ProfileSubmission {
    pub fn notice(&self) -> Notice {
        Notice::new(
            "Profile Created Successfully!",
            "Your AI agent will contact you shortly for the voice interview.",
        )
    }
}
