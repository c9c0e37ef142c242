use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for registered accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for lawyer profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LawyerId(pub String);

/// Case number, assigned once at submission and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseId(pub String);

/// Violation taxonomy shared by tickets and lawyer specializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    Speeding,
    RedLight,
    StopSign,
    CellPhone,
    Hov,
    RecklessDriving,
    SuspendedLicense,
    Dui,
    LaneChange,
    NoInsurance,
    Racing,
    ConstructionZone,
    CdlViolations,
    TrafficMisdemeanor,
    Other,
}

impl ViolationType {
    pub const fn label(self) -> &'static str {
        match self {
            ViolationType::Speeding => "speeding",
            ViolationType::RedLight => "red_light",
            ViolationType::StopSign => "stop_sign",
            ViolationType::CellPhone => "cell_phone",
            ViolationType::Hov => "hov",
            ViolationType::RecklessDriving => "reckless_driving",
            ViolationType::SuspendedLicense => "suspended_license",
            ViolationType::Dui => "dui",
            ViolationType::LaneChange => "lane_change",
            ViolationType::NoInsurance => "no_insurance",
            ViolationType::Racing => "racing",
            ViolationType::ConstructionZone => "construction_zone",
            ViolationType::CdlViolations => "cdl_violations",
            ViolationType::TrafficMisdemeanor => "traffic_misdemeanor",
            ViolationType::Other => "other",
        }
    }
}

/// Monthly submission allowance attached to every account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyQuota {
    pub cases_per_month: u32,
    pub cases_used: u32,
    pub reset_date: Option<DateTime<Utc>>,
}

impl MonthlyQuota {
    pub fn new(cases_per_month: u32) -> Self {
        Self {
            cases_per_month,
            cases_used: 0,
            reset_date: None,
        }
    }

    /// Apply a pending monthly reset. Returns true when the window rolled.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.reset_date.map(|reset| now >= reset).unwrap_or(true);
        if due {
            self.cases_used = 0;
            self.reset_date = now.checked_add_months(Months::new(1));
        }
        due
    }

    pub fn has_capacity(&self) -> bool {
        self.cases_used < self.cases_per_month
    }

    pub fn consume(&mut self) {
        self.cases_used += 1;
    }
}

/// A registered account: defendant, lawyer owner, or back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: crate::access::Role,
    pub quota: MonthlyQuota,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Geographic coverage for a lawyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub state: String,
    pub counties: Vec<String>,
    pub courts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub is_available: bool,
    pub max_cases: u32,
    pub current_cases: u32,
}

impl Availability {
    pub fn has_open_slot(&self) -> bool {
        self.is_available && self.current_cases < self.max_cases
    }
}

/// Rolling client-rating aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: u32,
}

impl Rating {
    pub fn record(&mut self, new_rating: u8) {
        let total = self.average * f64::from(self.count) + f64::from(new_rating);
        self.count += 1;
        self.average = total / f64::from(self.count);
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self {
            average: 0.0,
            count: 0,
        }
    }
}

/// Outcome counters feeding the matcher's success-rate signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseStatistics {
    pub total_cases: u32,
    pub cases_won: u32,
    pub cases_dismissed: u32,
    pub cases_reduced: u32,
    pub success_rate: u8,
}

impl CaseStatistics {
    /// `round(100 * (won + dismissed + reduced) / total)`, zero without cases.
    pub fn recompute_success_rate(&mut self) -> u8 {
        if self.total_cases == 0 {
            self.success_rate = 0;
            return 0;
        }

        let successful = self.cases_won + self.cases_dismissed + self.cases_reduced;
        let rate = (f64::from(successful) / f64::from(self.total_cases)) * 100.0;
        self.success_rate = rate.round() as u8;
        self.success_rate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_number: String,
    pub routing_number: String,
    pub account_holder_name: String,
}

/// Lawyer profile owned 1:1 by an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LawyerProfile {
    pub lawyer_id: LawyerId,
    pub user_id: UserId,
    pub license_number: String,
    pub bar_association: String,
    pub years_of_experience: u32,
    pub specializations: Vec<ViolationType>,
    pub jurisdictions: Vec<Jurisdiction>,
    pub bio: Option<String>,
    pub is_approved: bool,
    pub availability: Availability,
    pub rating: Rating,
    pub statistics: CaseStatistics,
    pub bank_details: Option<BankDetails>,
}

impl LawyerProfile {
    pub fn specializes_in(&self, violation: ViolationType) -> bool {
        self.specializations.contains(&violation)
    }

    pub fn covers_state(&self, state: &str) -> bool {
        self.jurisdictions
            .iter()
            .any(|jurisdiction| jurisdiction.state.eq_ignore_ascii_case(state))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketLocation {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: String,
    pub county: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtInfo {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Everything captured off the physical ticket at intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetails {
    pub violation_type: ViolationType,
    pub ticket_number: Option<String>,
    pub issue_date: NaiveDate,
    pub location: TicketLocation,
    pub court: CourtInfo,
    pub fine_cents: u64,
    pub points: Option<u8>,
    /// External storage reference; upload handling lives outside this crate.
    pub ticket_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub is_cdl_driver: bool,
    pub license_number: Option<String>,
    pub license_state: Option<String>,
}

/// Case progression states. Transitions are validated in `lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    Assigned,
    InProgress,
    CourtScheduled,
    Dismissed,
    Reduced,
    Lost,
    Closed,
}

impl CaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Assigned => "assigned",
            CaseStatus::InProgress => "in_progress",
            CaseStatus::CourtScheduled => "court_scheduled",
            CaseStatus::Dismissed => "dismissed",
            CaseStatus::Reduced => "reduced",
            CaseStatus::Lost => "lost",
            CaseStatus::Closed => "closed",
        }
    }

    /// Outcome states and `closed` accept no further progress except closing.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            CaseStatus::Dismissed | CaseStatus::Reduced | CaseStatus::Lost | CaseStatus::Closed
        )
    }
}

/// Append-only log entry; the case status always mirrors the latest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: CaseStatus,
    pub note: String,
    pub actor: UserId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeType {
    Dismissed,
    Reduced,
    Guilty,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub outcome: OutcomeType,
    pub final_fine_cents: Option<u64>,
    pub final_points: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

/// Payment view embedded on the case; the ledger owns the full record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePayment {
    pub status: CasePaymentStatus,
    pub payment_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Default for CasePayment {
    fn default() -> Self {
        Self {
            status: CasePaymentStatus::Pending,
            payment_id: None,
            paid_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasePricing {
    pub quoted_cents: u64,
    pub actual_cents: Option<u64>,
    pub refund_cents: Option<u64>,
}

/// One-shot client rating captured after representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRating {
    pub rating: u8,
    pub review: Option<String>,
    pub rated_at: DateTime<Utc>,
}

/// The central work item tracked end to end. Never deleted; closed instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_number: CaseId,
    pub user_id: UserId,
    pub lawyer_id: Option<LawyerId>,
    pub ticket: TicketDetails,
    pub client: ClientInfo,
    pub status: CaseStatus,
    pub timeline: Vec<TimelineEntry>,
    pub court_date: Option<DateTime<Utc>>,
    pub outcome: Option<CaseOutcome>,
    pub pricing: CasePricing,
    pub payment: CasePayment,
    pub assignment_score: Option<f64>,
    pub client_rating: Option<ClientRating>,
    pub opened_at: DateTime<Utc>,
}

impl CaseRecord {
    /// Open a new case in `pending` with its initial timeline entry.
    pub fn open(
        case_number: CaseId,
        user_id: UserId,
        ticket: TicketDetails,
        client: ClientInfo,
        quoted_cents: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let timeline = vec![TimelineEntry {
            status: CaseStatus::Pending,
            note: "Case submitted successfully".to_string(),
            actor: user_id.clone(),
            timestamp: now,
        }];

        Self {
            case_number,
            user_id,
            lawyer_id: None,
            ticket,
            client,
            status: CaseStatus::Pending,
            timeline,
            court_date: None,
            outcome: None,
            pricing: CasePricing {
                quoted_cents,
                actual_cents: None,
                refund_cents: None,
            },
            payment: CasePayment::default(),
            assignment_score: None,
            client_rating: None,
            opened_at: now,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment.status == CasePaymentStatus::Paid
    }
}
