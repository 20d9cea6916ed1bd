//! Test Request Generator
//!
//! Generates random customer profiles and sends them to the engine as NATS
//! requests, logging the replies.

use emi_risk_engine::types::CustomerProfile;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Random customer generator for testing
struct ProfileGenerator {
    rng: rand::rngs::ThreadRng,
}

impl ProfileGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// A customer whose request fits comfortably within their income
    fn generate_typical(&mut self) -> CustomerProfile {
        let salary = self.rng.gen_range(40_000.0..200_000.0_f64).round();

        CustomerProfile {
            age: self.rng.gen_range(23.0..58.0_f64).round(),
            family_size: self.rng.gen_range(1..6) as f64,
            dependents: self.rng.gen_range(0..3) as f64,
            years_of_employment: self.rng.gen_range(1..25) as f64,
            monthly_salary: salary,
            credit_score: self.rng.gen_range(680..850) as f64,
            bank_balance: (salary * self.rng.gen_range(2.0..8.0)).round(),
            emergency_fund: (salary * self.rng.gen_range(1.0..4.0)).round(),
            monthly_rent: (salary * self.rng.gen_range(0.0..0.25)).round(),
            groceries_utilities: (salary * self.rng.gen_range(0.1..0.2)).round(),
            current_emi_amount: 0.0,
            requested_amount: (salary * self.rng.gen_range(5.0..20.0)).round(),
            requested_tenure: self.random_choice(&[60.0, 120.0, 180.0, 240.0]),
            interest_rate: Some(self.rng.gen_range(7.5..10.0)),
            ..self.categoricals()
        }
    }

    /// A customer asking for far more than their income supports
    fn generate_stretched(&mut self) -> CustomerProfile {
        let salary = self.rng.gen_range(15_000.0..45_000.0_f64).round();

        CustomerProfile {
            age: self.rng.gen_range(21.0..30.0_f64).round(),
            years_of_employment: self.rng.gen_range(0..3) as f64,
            monthly_salary: salary,
            credit_score: self.rng.gen_range(300..620) as f64,
            bank_balance: (salary * self.rng.gen_range(0.0..1.0)).round(),
            emergency_fund: 0.0,
            monthly_rent: (salary * self.rng.gen_range(0.3..0.5)).round(),
            current_emi_amount: (salary * self.rng.gen_range(0.2..0.4)).round(),
            requested_amount: (salary * self.rng.gen_range(40.0..100.0)).round(),
            requested_tenure: self.random_choice(&[12.0, 24.0, 36.0]),
            existing_loans: "Yes".to_string(),
            interest_rate: Some(self.rng.gen_range(12.0..18.0)),
            ..self.categoricals()
        }
    }

    fn categoricals(&mut self) -> CustomerProfile {
        CustomerProfile {
            gender: self.random_choice(&["Male", "Female"]).to_string(),
            marital_status: self.random_choice(&["Married", "Single"]).to_string(),
            education: self
                .random_choice(&["Graduate", "Post_Graduate", "High_School", "Undergraduate"])
                .to_string(),
            employment_type: self
                .random_choice(&["Government", "Private", "Self_Employed", "Contract"])
                .to_string(),
            company_type: self
                .random_choice(&["MNC", "Startup", "SME", "Others"])
                .to_string(),
            house_type: self.random_choice(&["Owned", "Rented"]).to_string(),
            emi_scenario: self
                .random_choice(&["New_Loan", "Top_Up", "Refinance", "Balance_Transfer"])
                .to_string(),
            ..CustomerProfile::default()
        }
    }

    fn generate(&mut self, stretched_rate: f64) -> CustomerProfile {
        if self.rng.gen_bool(stretched_rate) {
            self.generate_stretched()
        } else {
            self.generate_typical()
        }
    }

    fn random_choice<T: Copy>(&mut self, choices: &[T]) -> T {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Request Generator");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let prefix = args.get(2).map(|s| s.as_str()).unwrap_or("emi");
    let operation = args.get(3).map(|s| s.as_str()).unwrap_or("comprehensive");
    let count: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);
    let stretched_rate: f64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(0.2);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(100);

    let subject = format!("{prefix}.{operation}");
    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        stretched_rate = stretched_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, stretched_rate, delay_ms).await;
        }
    };

    let mut generator = ProfileGenerator::new();
    let mut answered = 0u64;
    let mut failed = 0u64;

    info!("Sending {} requests...", count);

    for i in 0..count {
        let profile = generator.generate(stretched_rate);
        let payload = serde_json::to_vec(&profile)?;

        match client.request(subject.clone(), payload.into()).await {
            Ok(reply) => {
                answered += 1;
                if (i + 1) % 10 == 0 || i == 0 {
                    info!(
                        "Reply {}/{}: {}",
                        i + 1,
                        count,
                        String::from_utf8_lossy(&reply.payload)
                    );
                }
            }
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Request failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} answered, {} failed)",
        count, answered, failed
    );

    // Finish with the dashboard view
    match client
        .request(format!("{prefix}.dashboard"), Vec::<u8>::new().into())
        .await
    {
        Ok(reply) => info!("Dashboard:\n{}", String::from_utf8_lossy(&reply.payload)),
        Err(e) => warn!(error = %e, "Dashboard request failed"),
    }

    Ok(())
}

async fn run_dry_mode(count: u64, stretched_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ProfileGenerator::new();

    for i in 0..count {
        let profile = generator.generate(stretched_rate);
        let json = serde_json::to_string_pretty(&profile)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample profile {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
