//! Request and response bodies.

use chrono::{DateTime, Utc};
use fund_ledger::{Donation, MAX_PROJECT_NAME_LEN};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectCreate {
    pub name: String,
    pub description: String,
    pub full_amount: i64,
}

impl ProjectCreate {
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_description(&self.description)?;
        validate_amount(self.full_amount)
    }
}

/// Partial edit of a project. Bookkeeping fields are not accepted here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub full_amount: Option<i64>,
}

impl ProjectUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_none() && self.description.is_none() && self.full_amount.is_none() {
            return Err(LedgerError::Unprocessable(
                "Nothing to update: provide name, description or full_amount".into(),
            ));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(amount) = self.full_amount {
            validate_amount(amount)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DonationCreate {
    pub full_amount: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl DonationCreate {
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.full_amount)
    }
}

/// What a donor sees of a donation: no owner and no bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationView {
    pub id: i64,
    pub comment: Option<String>,
    pub full_amount: i64,
    pub create_date: DateTime<Utc>,
}

impl From<&Donation> for DonationView {
    fn from(d: &Donation) -> Self {
        DonationView {
            id: d.id,
            comment: d.comment.clone(),
            full_amount: d.full_amount,
            create_date: d.create_date,
        }
    }
}

/// A single donation as a given viewer may see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DonationBody {
    Full(Donation),
    Reduced(DonationView),
}

impl DonationBody {
    pub fn for_viewer(donation: Donation, viewer_id: i64, is_admin: bool) -> Self {
        if donation.visible_in_full_to(viewer_id, is_admin) {
            DonationBody::Full(donation)
        } else {
            DonationBody::Reduced(DonationView::from(&donation))
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Unprocessable(
            "Project name must not be empty".into(),
        ));
    }
    if name.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(LedgerError::Unprocessable(format!(
            "Project name must be at most {MAX_PROJECT_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Unprocessable(
            "Project description must not be empty".into(),
        ));
    }
    Ok(())
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(LedgerError::Unprocessable(format!(
            "full_amount must be a positive integer, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_create_rules() {
        let ok = ProjectCreate {
            name: "Shelter".into(),
            description: "Winter shelter".into(),
            full_amount: 10,
        };
        assert!(ok.validate().is_ok());

        let long_name = ProjectCreate {
            name: "x".repeat(MAX_PROJECT_NAME_LEN + 1),
            ..ok.clone()
        };
        assert!(matches!(
            long_name.validate(),
            Err(LedgerError::Unprocessable(_))
        ));

        let blank = ProjectCreate {
            description: "  ".into(),
            ..ok.clone()
        };
        assert!(blank.validate().is_err());

        let zero = ProjectCreate {
            full_amount: 0,
            ..ok
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn empty_update_is_refused() {
        assert!(ProjectUpdate::default().validate().is_err());
        let only_amount = ProjectUpdate {
            full_amount: Some(5),
            ..Default::default()
        };
        assert!(only_amount.validate().is_ok());
    }

    #[test]
    fn strangers_get_the_reduced_body() {
        let donation = Donation::new(7, 50, Some("for cats".into()), Utc::now());

        let owner = DonationBody::for_viewer(donation.clone(), 7, false);
        let owner = serde_json::to_value(owner).unwrap();
        assert_eq!(owner["user_id"], 7);
        assert_eq!(owner["invested_amount"], 0);

        let stranger = DonationBody::for_viewer(donation.clone(), 8, false);
        assert_eq!(stranger, DonationBody::Reduced(DonationView::from(&donation)));
        let stranger = serde_json::to_value(stranger).unwrap();
        assert!(stranger.get("user_id").is_none());
        assert_eq!(stranger["comment"], "for cats");

        assert!(matches!(
            DonationBody::for_viewer(donation, 8, true),
            DonationBody::Full(_)
        ));
    }

    #[test]
    fn bookkeeping_fields_cannot_be_patched() {
        let parsed: std::result::Result<ProjectUpdate, _> =
            serde_json::from_str(r#"{"invested_amount": 5}"#);
        assert!(parsed.is_err());
    }
}
