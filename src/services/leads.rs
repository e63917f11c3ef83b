use tracing::info;

use crate::{
    db::store::LeadStore,
    error::AppError,
    models::{
        firm::Firm,
        lead::{Lead, NewLead},
    },
    services::{metrics::LEADS_COUNTER, validation::validate_lead},
};

pub struct LeadService;

impl LeadService {
    pub async fn submit(leads: &dyn LeadStore, firm: &Firm, lead: &NewLead) -> Result<Lead, AppError> {
        validate_lead(lead)?;
        let lead = NewLead {
            full_name: lead.full_name.trim().to_string(),
            email: lead.email.trim().to_string(),
            phone: lead.phone.trim().to_string(),
        };
        let stored = leads.insert(firm.id, &lead).await?;
        LEADS_COUNTER.with_label_values(&[&firm.slug]).inc();
        info!(firm = %firm.slug, lead = %stored.id, "lead submitted");
        Ok(stored)
    }

    /// Newest first, narrowed to `term` when it is non-blank.
    pub async fn search(
        leads: &dyn LeadStore,
        firm: &Firm,
        term: Option<&str>,
    ) -> Result<Vec<Lead>, AppError> {
        let all = leads.list_for_firm(firm.id).await?;
        Ok(match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => all.into_iter().filter(|l| l.matches(term)).collect(),
            None => all,
        })
    }

    pub fn export_csv(leads: &[Lead]) -> anyhow::Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["full_name", "email", "phone", "submitted_at"])?;
        for lead in leads {
            let submitted_at = lead.submitted_at.to_rfc3339();
            writer.write_record([
                lead.full_name.as_str(),
                lead.email.as_str(),
                lead.phone.as_str(),
                submitted_at.as_str(),
            ])?;
        }
        writer.into_inner().map_err(|e| anyhow::anyhow!("csv flush failed: {e}"))
    }
}
