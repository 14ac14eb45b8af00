use crate::cli::{QueryArgs, SendArgs};
use agent_digest::config::AppConfig;
use agent_digest::error::AppError;
use agent_digest::telemetry;
use agent_digest::workflows::agents::{
    compile, select_indices, DigestComposer, DispatchPorts, Dispatcher, HandlebarsRenderer,
    HttpSearchGateway, JsonSubscriberDirectory, MailgunSender, RunConfig, RunOutcome, RunReport,
    SubscriberDirectory, YamlTranslationLoader,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

const GATE_MESSAGE: &str =
    "This command is allowed only on production. To execute it anyway, use the -f option";

fn dispatch_ports(config: &AppConfig) -> Result<DispatchPorts, AppError> {
    let templates_dir = &config.mail.templates_dir;
    let renderer = HandlebarsRenderer::from_directory(templates_dir)?;

    Ok(DispatchPorts {
        directory: Arc::new(JsonSubscriberDirectory::new(&config.paths.subscribers)),
        translations: Arc::new(YamlTranslationLoader::new(&config.paths.locale_dir)),
        search: Arc::new(HttpSearchGateway::new(config.search.base_url.clone())),
        renderer: Arc::new(renderer),
        sender: Arc::new(MailgunSender::new(&config.mail)),
        composer: DigestComposer::new(templates_dir.join("agent").join("images")),
    })
}

pub(crate) async fn send_digests(args: SendArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let run_config = RunConfig::from_app(&config, args.force);
    if !run_config.gate_open() {
        println!("{GATE_MESSAGE}");
        return Ok(());
    }

    let dispatcher = Dispatcher::new(run_config, dispatch_ports(&config)?);

    let stop = dispatcher.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, no further subscribers will be dispatched");
            stop.stop();
        }
    });

    match dispatcher.run().await? {
        RunOutcome::Gated { .. } => println!("{GATE_MESSAGE}"),
        RunOutcome::Completed(report) => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Agent run {}", report.run_id);
    println!(
        "- sent {}, skipped {}, failed {}",
        report.sent,
        report.skipped(),
        report.failed()
    );
    println!(
        "- no matches {}, unconfirmed {}, duplicates {}, cancelled {}",
        report.no_matches, report.unconfirmed, report.duplicates, report.cancelled
    );
    for failure in &report.failures {
        println!("- subscriber {}: {}", failure.subscriber_id, failure.reason);
    }
}

pub(crate) async fn print_queries(args: QueryArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let path = args.subscribers.unwrap_or_else(|| config.paths.subscribers.clone());
    let subscribers = JsonSubscriberDirectory::new(path)
        .active_subscribers()
        .await?;

    let now = Utc::now();
    for subscriber in &subscribers {
        let indices = select_indices(&config.search.index_prefix, &subscriber.languages);
        let request = compile(subscriber, config.domain.id, now);
        let entry = json!({
            "subscriber": subscriber.id,
            "confirmed": subscriber.is_confirmed(),
            "path": indices.search_path(),
            "body": request.to_json(),
        });
        println!("{entry:#}");
    }
    Ok(())
}
