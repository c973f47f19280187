use crate::Notice;
use crate::error::DirectoryError;
use serde::Serialize;

/// A member card in the community directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: &'static str,
    pub name: &'static str,
    pub location: &'static str,
    pub industry: &'static str,
    pub profession: &'static str,
    pub experience: &'static str,
    /// Role slug, e.g. `product-owner`.
    pub role: &'static str,
    pub interests: &'static [&'static str],
    /// Fixed "AI match" score; not computed.
    pub match_score: Option<u8>,
}

pub const MEMBERS: [Member; 6] = [
    Member {
        id: "1",
        name: "Sarah Chen",
        location: "San Francisco, CA",
        industry: "Technology",
        profession: "ML Engineer",
        experience: "6-10 years",
        role: "entrepreneur",
        interests: &["Computer Vision", "NLP", "Healthcare AI", "Startups"],
        match_score: Some(92),
    },
    Member {
        id: "2",
        name: "Marcus Johnson",
        location: "New York, NY",
        industry: "Finance",
        profession: "Data Scientist",
        experience: "4-5 years",
        role: "product-owner",
        interests: &["Fintech", "Risk Modeling", "Deep Learning"],
        match_score: Some(87),
    },
    Member {
        id: "3",
        name: "Elena Rodriguez",
        location: "Austin, TX",
        industry: "Healthcare",
        profession: "AI Researcher",
        experience: "10+ years",
        role: "founder",
        interests: &["Medical AI", "Ethics", "Research", "Publications"],
        match_score: None,
    },
    Member {
        id: "4",
        name: "David Kim",
        location: "Seattle, WA",
        industry: "Technology",
        profession: "Product Manager",
        experience: "2-3 years",
        role: "designer",
        interests: &["UX/UI", "AI Products", "User Research"],
        match_score: None,
    },
    Member {
        id: "5",
        name: "Amanda Foster",
        location: "Boston, MA",
        industry: "Education",
        profession: "AI Consultant",
        experience: "6-10 years",
        role: "investor",
        interests: &["EdTech", "AI Training", "Curriculum Design"],
        match_score: None,
    },
    Member {
        id: "6",
        name: "James Liu",
        location: "Los Angeles, CA",
        industry: "Entertainment",
        profession: "Computer Vision Engineer",
        experience: "4-5 years",
        role: "partner",
        interests: &["Media AI", "Content Generation", "Creative Tools"],
        match_score: None,
    },
];

/// Search box plus the two select filters. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryFilter {
    pub search: String,
    /// Lower-case industry name, e.g. `technology`.
    pub industry: Option<String>,
    /// Role slug, e.g. `product-owner`.
    pub role: Option<String>,
}

impl DirectoryFilter {
    pub fn matches(&self, member: &Member) -> bool {
        if !self.search.is_empty() {
            let needle = self.search.to_lowercase();
            let hit = member.name.to_lowercase().contains(&needle)
                || member.profession.to_lowercase().contains(&needle)
                || member
                    .interests
                    .iter()
                    .any(|interest| interest.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        if let Some(industry) = &self.industry {
            if member.industry.to_lowercase() != *industry {
                return false;
            }
        }
        if let Some(role) = &self.role {
            if member.role != role {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, members: &'a [Member]) -> Vec<&'a Member> {
        members.iter().filter(|member| self.matches(member)).collect()
    }

    /// Labels for the active filters, in display order.
    pub fn active_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        if !self.search.is_empty() {
            labels.push(format!("Search: {}", self.search));
        }
        if let Some(industry) = &self.industry {
            labels.push(format!("Industry: {}", industry));
        }
        if let Some(role) = &self.role {
            labels.push(format!("Role: {}", role.replacen('-', " ", 1)));
        }
        labels
    }
}

/// Industries present in `members`, first-seen order.
pub fn unique_industries(members: &[Member]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for member in members {
        if !out.contains(&member.industry) {
            out.push(member.industry);
        }
    }
    out
}

/// Role slugs present in `members`, first-seen order.
pub fn unique_roles(members: &[Member]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for member in members {
        if !out.contains(&member.role) {
            out.push(member.role);
        }
    }
    out
}

/// `product-owner` -> `Product owner`.
pub fn role_label(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.collect();
            format!("{}{}", first.to_uppercase(), rest.replacen('-', " ", 1))
        }
        None => String::new(),
    }
}

pub fn summary(shown: usize, total: usize) -> String {
    format!("Showing {} of {} members", shown, total)
}

pub const NO_RESULTS: &str = "No members found matching your criteria.";

/// Sends a connection request to a member.
pub fn connect(members: &[Member], member_id: &str) -> Result<Notice, DirectoryError> {
    let member = members
        .iter()
        .find(|member| member.id == member_id)
        .ok_or_else(|| DirectoryError::UnknownMember(member_id.to_string()))?;
    tracing::info!("Connection request sent to member {}.", member.id);
    Ok(Notice::new(
        "Connection Request Sent!",
        format!(
            "Your connection request has been sent to {}. They'll be notified and can reach out to you directly.",
            member.name
        ),
    ))
}
