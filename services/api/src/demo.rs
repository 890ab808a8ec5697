use crate::infra::{load_catalog, Services};
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use visa_desk::clock::FixedClock;
use visa_desk::config::{CatalogConfig, ConfigError, SchedulingConfig};
use visa_desk::error::AppError;
use visa_desk::workflows::casework::{FinalOutcome, FolderSummary};
use visa_desk::workflows::directory::NewApplicant;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Visa type the demo applicant applies for
    #[arg(long, default_value = "tourist")]
    pub(crate) visa: String,
    /// Optional requirement catalog CSV (visa_code,visa_name,requirement_code,requirement_name)
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
    /// Close the folder as rejected instead of accepted
    #[arg(long)]
    pub(crate) reject_case: bool,
}

fn demo_instant(day: u32, hour: u32, minute: u32) -> Result<DateTime<FixedOffset>, AppError> {
    FixedOffset::west_opt(5 * 3600)
        .and_then(|offset| {
            offset
                .with_ymd_and_hms(2024, 6, day, hour, minute, 0)
                .single()
        })
        .ok_or_else(|| AppError::Config(ConfigError::InvalidTimestamp {
            variable: "demo clock",
            value: format!("2024-06-{day:02} {hour:02}:{minute:02}"),
        }))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        visa,
        catalog_csv,
        reject_case,
    } = args;

    let catalog = load_catalog(&CatalogConfig {
        csv_path: catalog_csv,
    })?;
    let clock = Arc::new(FixedClock::new(demo_instant(3, 8, 0)?));
    let services = Services::build(catalog, SchedulingConfig::default(), clock.clone());

    println!("Visa desk demo (clock starts {})", clock_label(demo_instant(3, 8, 0)?));
    services.seed_agents(&["Ana Torres".to_string(), "Bruno Salas".to_string()])?;

    let applicant = services.directory.register_applicant(NewApplicant {
        name: "Lucía Pérez".to_string(),
        email: Some("lucia.perez@example.com".to_string()),
        national_id: Some("1712345678".to_string()),
    })?;
    services.directory.assign_visa_type(&applicant.id, &visa)?;
    println!("- registered {} ({}) for a {visa} visa", applicant.name, applicant.id);

    let start = demo_instant(10, 9, 0)?;
    let appointment = services.scheduling.allocate(&applicant.id, start)?;
    println!(
        "- booked {} with agent {} at {}",
        appointment.id,
        appointment.agent,
        clock_label(appointment.start)
    );

    clock.set(start + Duration::minutes(5));
    let requirements = services
        .casework
        .assign_from_catalog(&applicant.id, &appointment.id)?;
    services.scheduling.mark_successful(&appointment.id)?;
    println!("\nAppointment day: {} requirements assigned", requirements.len());
    for requirement in &requirements {
        println!("  - {} ({})", requirement.name, requirement.code);
    }
    print_folder(&services.casework.folder_summary(&applicant.id)?);

    println!("\nDocument review");
    for (index, requirement) in requirements.iter().enumerate() {
        clock.advance(Duration::hours(1));
        let filename = format!("{}.pdf", requirement.name);
        let first = services
            .casework
            .upload(&requirement.id, &filename, b"scanned document")?;
        println!("  - uploaded {} v{}", requirement.name, first.version);

        let accepted = if index == 0 {
            let outcome = services
                .casework
                .reject(&first.id, "Scan is illegible, please upload a clearer copy")?;
            println!(
                "    rejected: {}",
                outcome.version.observations.unwrap_or_default()
            );
            let retry = services
                .casework
                .upload(&requirement.id, &filename, b"clear scan")?;
            println!("  - uploaded {} v{}", requirement.name, retry.version);
            retry
        } else {
            first
        };

        let outcome = services.casework.approve(&accepted.id)?;
        println!(
            "    approved v{} | folder {}",
            outcome.version.version, outcome.folder_state
        );
    }
    print_folder(&services.casework.folder_summary(&applicant.id)?);

    let (outcome, reason) = if reject_case {
        (FinalOutcome::Rejected, Some("Insufficient proof of funds"))
    } else {
        (FinalOutcome::Accepted, None)
    };
    let folder = services
        .casework
        .record_final_result(&applicant.id, outcome, reason)?;
    println!("\nFinal result recorded: folder {}", folder.state);

    let sent = services.notifier.sent();
    println!("\nNotifications sent ({})", sent.len());
    for notification in sent {
        println!("  - to {}: {}", notification.recipient, notification.message);
    }

    Ok(())
}

fn print_folder(summary: &FolderSummary) {
    println!(
        "Folder {} | {}% complete ({}/{} approved)",
        summary.state, summary.progress, summary.approved, summary.total
    );
}

fn clock_label(instant: DateTime<FixedOffset>) -> String {
    instant.format("%a %Y-%m-%d %H:%M %:z").to_string()
}
