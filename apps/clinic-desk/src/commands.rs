use anyhow::{Context, Result, anyhow};
use clinic_copay::{BilledService, CopaymentEngine, CopaymentLedgerEntry};
use clinic_errors::{FailureKind, Rejection};
use clinic_gateway::{GatewayError, Payload, RequestDescriptor, RequestGateway};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

/// HTTP verbs the console can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    fn descriptor(self, path: &str) -> RequestDescriptor {
        match self {
            Self::Get => RequestDescriptor::get(path),
            Self::Post => RequestDescriptor::post(path),
            Self::Put => RequestDescriptor::put(path),
            Self::Patch => RequestDescriptor::patch(path),
            Self::Delete => RequestDescriptor::delete(path),
        }
    }
}

/// Compute a split locally and print it.
///
/// # Errors
/// Fails on invalid amounts.
pub fn copay(
    engine: &CopaymentEngine,
    cost: Decimal,
    insured: bool,
    accumulated: Decimal,
) -> Result<()> {
    match engine.calculate(cost, insured, accumulated) {
        Ok(split) => print_json(&split),
        Err(err) => {
            print_json(&err.to_problem())?;
            Err(anyhow!(err))
        }
    }
}

/// Send one request and print the payload.
///
/// # Errors
/// Fails with the classified gateway error after printing its problem.
pub async fn request(
    gateway: &RequestGateway,
    verb: Verb,
    path: &str,
    body: Option<Value>,
) -> Result<()> {
    let mut descriptor = verb.descriptor(path);
    if let Some(body) = body {
        descriptor = descriptor.body(body);
    }

    let response = gateway
        .dispatch(descriptor)
        .await
        .map_err(|err| report_failure(gateway, &err))?;

    match response.into_payload() {
        Payload::Json(value) => print_json(&value)?,
        Payload::Text(text) => println!("{text}"),
        Payload::Empty => {}
    }
    Ok(())
}

/// Apply one billed service to a patient's ledger on the backend.
///
/// Reads the entry for `year` (missing means nothing billed yet), settles
/// the service locally and writes the next entry back.
///
/// # Errors
/// Fails on any gateway failure other than a missing entry, or on invalid
/// amounts.
pub async fn settle(
    gateway: &RequestGateway,
    engine: &CopaymentEngine,
    patient: &str,
    service: BilledService,
) -> Result<()> {
    let path = format!("/patients/{patient}/copay-ledger/{}", service.year);

    let entry = match gateway.get(&path).await {
        Ok(response) => response
            .json::<CopaymentLedgerEntry>()
            .context("backend returned an unreadable ledger entry")?,
        Err(err) if err.kind() == FailureKind::ClientRejection(Rejection::NotFound) => {
            tracing::info!(patient, year = service.year, "no ledger entry yet, starting fresh");
            CopaymentLedgerEntry::fresh(service.year)
        }
        Err(err) => return Err(report_failure(gateway, &err)),
    };

    let settlement = match engine.settle(&entry, &service) {
        Ok(settlement) => settlement,
        Err(err) => {
            print_json(&err.to_problem())?;
            return Err(anyhow!(err));
        }
    };

    gateway
        .put(&path, &settlement.entry)
        .await
        .map_err(|err| report_failure(gateway, &err))?;

    tracing::info!(
        patient,
        year = settlement.entry.year,
        case = %settlement.split.case,
        accumulated = %settlement.entry.accumulated_amount,
        "copay settled"
    );
    print_json(&settlement)
}

/// Print the problem for `err` and turn it into the command's failure.
///
/// An authentication rejection also ends the session.
fn report_failure(gateway: &RequestGateway, err: &GatewayError) -> anyhow::Error {
    if err.requires_reauthentication() {
        gateway.session().sign_out();
        tracing::warn!(status = err.status(), "session rejected by the backend; sign in again");
    }
    if let Err(print_err) = print_json(&err.to_problem()) {
        tracing::error!(error = %print_err, "failed to print problem");
    }
    anyhow!("{}: {err}", err.kind())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
