use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "api_logins_total",
        "Login attempts by status",
        &["status"]
    ).unwrap();

    pub static ref SIGNUPS_COUNTER: CounterVec = register_counter_vec!(
        "api_signups_total",
        "Signups by status",
        &["status"]
    ).unwrap();

    pub static ref PROVISIONING_COUNTER: CounterVec = register_counter_vec!(
        "api_firm_provisioning_total",
        "Firm provisioning runs by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref POLLER_OUTCOMES: CounterVec = register_counter_vec!(
        "api_signup_poll_total",
        "Post-signup firm lookups by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref LEADS_COUNTER: CounterVec = register_counter_vec!(
        "api_leads_submitted_total",
        "Leads submitted through the public intake form, by firm",
        &["firm"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref FIRMS_GAUGE: Gauge = register_gauge!(
        "lawleads_firms_total",
        "Number of firms, as of the last admin directory load"
    ).unwrap();
}
