use crate::infra::{
    InMemoryAccountRepository, InMemoryCaseRepository, InMemoryLawyerRepository,
    InMemoryPaymentRepository, SandboxProcessor,
};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use ticketlaw::access::{Actor, Role};
use ticketlaw::config::BillingConfig;
use ticketlaw::error::AppError;
use ticketlaw::workflows::billing::BillingService;
use ticketlaw::workflows::cases::{
    Account, AccountRepository, CaseOutcome, CaseService, CaseStatus, ClientInfo, CourtInfo,
    Jurisdiction, MonthlyQuota, NewCaseRequest, OutcomeType, RegisterLawyerRequest,
    TicketDetails, TicketLocation, UpdateStatusRequest, UserId, ViolationType,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Platform fee percentage applied at confirmation
    #[arg(long, default_value_t = 20)]
    pub(crate) fee_percent: u8,
    /// Submit a DUI instead of a speeding ticket to show premium pricing
    #[arg(long)]
    pub(crate) dui: bool,
    /// Stop after the payment instead of losing the case and refunding
    #[arg(long)]
    pub(crate) skip_refund: bool,
}

fn dollars(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

fn demo_error(err: impl std::fmt::Display) -> AppError {
    AppError::Io(std::io::Error::other(err.to_string()))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let accounts = Arc::new(InMemoryAccountRepository::default());
    let lawyers = Arc::new(InMemoryLawyerRepository::default());
    let cases = Arc::new(InMemoryCaseRepository::default());
    let payments = Arc::new(InMemoryPaymentRepository::default());
    let processor = Arc::new(SandboxProcessor::default());

    let case_service = CaseService::new(cases.clone(), lawyers.clone(), accounts.clone());
    let billing = BillingService::new(
        payments,
        cases,
        lawyers,
        processor,
        BillingConfig {
            platform_fee_percent: args.fee_percent,
            vat_percent: 15,
        },
    );

    accounts
        .insert(Account {
            user_id: UserId("user-demo".to_string()),
            email: "casey@example.com".to_string(),
            first_name: "Casey".to_string(),
            last_name: "Nguyen".to_string(),
            phone: "206-555-0188".to_string(),
            role: Role::User,
            quota: MonthlyQuota::new(5),
        })
        .map_err(demo_error)?;
    accounts
        .insert(Account {
            user_id: UserId("user-counsel".to_string()),
            email: "riley@firm.example.com".to_string(),
            first_name: "Riley".to_string(),
            last_name: "Okafor".to_string(),
            phone: "206-555-0142".to_string(),
            role: Role::Lawyer,
            quota: MonthlyQuota::new(5),
        })
        .map_err(demo_error)?;

    println!("Marketplace demo ({}% platform fee)", args.fee_percent);

    let admin = Actor::new(UserId("admin-demo".to_string()), Role::Admin);
    let owner = Actor::new(UserId("user-demo".to_string()), Role::User);
    let counsel = Actor::new(UserId("user-counsel".to_string()), Role::Lawyer);

    let profile = case_service
        .register_lawyer(RegisterLawyerRequest {
            user_id: UserId("user-counsel".to_string()),
            license_number: "WA-7001".to_string(),
            bar_association: "WSBA".to_string(),
            years_of_experience: 9,
            specializations: vec![
                ViolationType::Speeding,
                ViolationType::Dui,
                ViolationType::CdlViolations,
            ],
            jurisdictions: vec![Jurisdiction {
                state: "WA".to_string(),
                counties: vec!["King".to_string()],
                courts: vec!["Seattle Municipal Court".to_string()],
            }],
            bio: Some("Former prosecutor, infraction defense.".to_string()),
            max_cases: Some(10),
            bank_details: None,
        })
        .map_err(demo_error)?;
    case_service
        .approve_lawyer(&profile.lawyer_id, &admin)
        .map_err(demo_error)?;
    println!("Registered and approved counsel {}", profile.license_number);

    let violation = if args.dui {
        ViolationType::Dui
    } else {
        ViolationType::Speeding
    };
    let case = case_service
        .submit(
            &UserId("user-demo".to_string()),
            NewCaseRequest {
                ticket: TicketDetails {
                    violation_type: violation,
                    ticket_number: Some("4A-88213".to_string()),
                    issue_date: Utc::now().date_naive(),
                    location: TicketLocation {
                        street: Some("Aurora Ave N".to_string()),
                        city: Some("Seattle".to_string()),
                        state: "WA".to_string(),
                        county: Some("King".to_string()),
                    },
                    court: CourtInfo {
                        name: "Seattle Municipal Court".to_string(),
                        address: None,
                        phone: None,
                    },
                    fine_cents: 13_600,
                    points: Some(2),
                    ticket_image: None,
                },
                client: ClientInfo::default(),
            },
            Utc::now(),
        )
        .map_err(demo_error)?;

    println!(
        "Case {} submitted: {} quoted {}, status {}",
        case.case_number.0,
        case.ticket.violation_type.label(),
        dollars(case.pricing.quoted_cents),
        case.status.label()
    );
    if let Some(score) = case.assignment_score {
        println!("Matched with score {score:.1}");
    }

    if case.status != CaseStatus::Assigned {
        println!("No counsel available; the case waits in the pending pool");
        return Ok(());
    }

    let receipt = billing
        .create_intent(&case.case_number, &owner, Utc::now())
        .map_err(demo_error)?;
    let payment = billing
        .confirm(&receipt.payment.payment_id, &owner, Utc::now())
        .map_err(demo_error)?;
    let fee = payment
        .platform_fee
        .ok_or_else(|| demo_error("confirmed payment is missing its fee split"))?;
    let payout = payment
        .lawyer_payout
        .clone()
        .ok_or_else(|| demo_error("confirmed payment is missing its payout"))?;
    println!(
        "Payment {} confirmed: {} total, platform keeps {}, counsel is owed {}",
        payment.payment_id.0,
        dollars(payment.amount_cents),
        dollars(fee.amount_cents),
        dollars(payout.amount_cents)
    );

    if args.skip_refund {
        println!("Stopping after payment per --skip-refund");
        return Ok(());
    }

    case_service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::CourtScheduled,
                note: Some("Hearing set".to_string()),
                court_date: Some(Utc::now() + chrono::Duration::days(21)),
                outcome: None,
            },
            &counsel,
            Utc::now(),
        )
        .map_err(demo_error)?;
    case_service
        .update_status(
            &case.case_number,
            UpdateStatusRequest {
                status: CaseStatus::Lost,
                note: Some("Found guilty at hearing".to_string()),
                court_date: None,
                outcome: Some(CaseOutcome {
                    outcome: OutcomeType::Guilty,
                    final_fine_cents: Some(13_600),
                    final_points: Some(2),
                    notes: None,
                }),
            },
            &counsel,
            Utc::now(),
        )
        .map_err(demo_error)?;
    println!("Hearing lost; guilty outcome recorded against counsel statistics");

    let refunded = billing
        .request_refund(
            &payment.payment_id,
            "Lost the case".to_string(),
            None,
            &owner,
            Utc::now(),
        )
        .map_err(demo_error)?;
    println!(
        "Refund auto-approved on the guilty outcome: payment {} is now {}",
        refunded.payment_id.0,
        refunded.status.label()
    );

    let rated = case_service
        .rate(
            &case.case_number,
            4,
            Some("Fought hard, court disagreed".to_string()),
            &owner,
            Utc::now(),
        )
        .map_err(demo_error)?;
    println!(
        "Client rating recorded: {}/5; case closed as {}",
        rated.client_rating.map(|rating| rating.rating).unwrap_or(0),
        rated.status.label()
    );

    Ok(())
}
